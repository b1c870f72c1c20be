use std::sync::Arc;

pub mod api;
pub mod authz;
pub mod config;
pub mod dto;
pub mod integrations;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::Config;

use authz::AuthzEngine;
use integrations::audio_store::AudioStore;
use integrations::azure_speech::SpeechProvider;
use services::token_service::IssuerState;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub authz: Arc<AuthzEngine>,
    pub provider: Arc<dyn SpeechProvider>,
    pub audio_store: AudioStore,
    /// Process-wide HTTP client; created at startup, shared by every
    /// integration.
    pub http: reqwest::Client,
    pub issuer: Arc<IssuerState>,
}
