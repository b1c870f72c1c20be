use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub port: u16,
    pub host: String,

    // Database
    pub database_url: String,

    // JWT
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,

    // Azure Speech provider
    pub azure_speech_key: String,
    pub azure_speech_region: String,

    // Scoped-credential issuance
    pub speech_token_ttl_secs: i64,
    pub demo_daily_token_quota: i64,
    pub auth_daily_token_quota: Option<i64>,

    // Batch grading
    pub grading_worker_pool_size: usize,
    pub grading_item_timeout_secs: u64,

    // Audio blob storage
    pub audio_storage_dir: String,
    pub audio_public_base_url: String,

    // CORS
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            database_url: std::env::var("DATABASE_URL")?,

            jwt_secret: std::env::var("JWT_SECRET")?,
            jwt_expiration_hours: std::env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,

            azure_speech_key: std::env::var("AZURE_SPEECH_KEY")
                .unwrap_or_else(|_| "".to_string()),
            azure_speech_region: std::env::var("AZURE_SPEECH_REGION")
                .unwrap_or_else(|_| "eastasia".to_string()),

            // Provider tokens are valid for 10 minutes at most.
            speech_token_ttl_secs: std::env::var("SPEECH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse::<i64>()?
                .min(600),
            demo_daily_token_quota: std::env::var("DEMO_DAILY_TOKEN_QUOTA")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            auth_daily_token_quota: std::env::var("AUTH_DAILY_TOKEN_QUOTA")
                .ok()
                .map(|v| v.parse())
                .transpose()?,

            grading_worker_pool_size: std::env::var("GRADING_WORKER_POOL_SIZE")
                .unwrap_or_else(|_| "8".to_string())
                .parse()?,
            grading_item_timeout_secs: std::env::var("GRADING_ITEM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            audio_storage_dir: std::env::var("AUDIO_STORAGE_DIR")
                .unwrap_or_else(|_| "./audio-uploads".to_string()),
            audio_public_base_url: std::env::var("AUDIO_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/audio".to_string()),

            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        };

        Ok(config)
    }
}
