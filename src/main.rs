use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duotopia_backend::authz::{AuthzEngine, PolicyTable};
use duotopia_backend::integrations::audio_store::AudioStore;
use duotopia_backend::integrations::azure_speech::{AzureSpeechClient, SpeechProvider};
use duotopia_backend::services::token_service::IssuerState;
use duotopia_backend::{api, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duotopia_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Database connection pool established");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Database migrations completed");

    // Compile the authorization policy; a malformed document is fatal.
    let authz = Arc::new(AuthzEngine::new(PolicyTable::compile()?));
    authz.load(&db_pool).await?;

    // Process-wide HTTP client, shared by every provider integration.
    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(20)
        .build()?;

    let provider: Arc<dyn SpeechProvider> = Arc::new(AzureSpeechClient::new(
        http.clone(),
        config.azure_speech_key.clone(),
        config.azure_speech_region.clone(),
    ));

    let audio_store = AudioStore::new(
        config.audio_storage_dir.clone(),
        config.audio_public_base_url.clone(),
    );

    // Build application state
    let app_state = AppState {
        db: db_pool,
        config: config.clone(),
        authz,
        provider,
        audio_store,
        http,
        issuer: Arc::new(IssuerState::new()),
    };

    // Build router
    let app = Router::new()
        .route("/", get(root))
        .merge(api::routes(app_state))
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Duotopia Backend API - v0.1.0"
}
