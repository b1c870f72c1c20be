use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::integrations::azure_speech::SpeechProvider;
use crate::repositories::assessment_repo::AssessmentRepository;
use crate::utils::error::{AppError, AppResult};

/// A cached provider credential plus its hard expiry.
#[derive(Debug, Clone)]
struct CachedCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Per-principal issuance slots. Concurrent requests for the same
/// principal lock the same slot, so only one of them performs the
/// provider exchange; the rest observe the cached credential.
#[derive(Default)]
pub struct IssuerState {
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Option<CachedCredential>>>>>,
}

impl IssuerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, principal_key: &str) -> Arc<tokio::sync::Mutex<Option<CachedCredential>>> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry(principal_key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }
}

#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub region: String,
    pub expires_in: i64,
}

pub struct TokenService {
    assessment_repo: AssessmentRepository,
    provider: Arc<dyn SpeechProvider>,
    issuer: Arc<IssuerState>,
    config: Config,
}

impl TokenService {
    pub fn new(
        assessment_repo: AssessmentRepository,
        provider: Arc<dyn SpeechProvider>,
        issuer: Arc<IssuerState>,
        config: Config,
    ) -> Self {
        Self {
            assessment_repo,
            provider,
            issuer,
            config,
        }
    }

    /// Issue a scoped assessment credential for an authenticated teacher
    /// or student.
    pub async fn issue_for_principal(&self, role: &str, id: i32) -> AppResult<IssuedCredential> {
        let key = format!("{}-{}", role, id);
        self.issue(&key, self.config.auth_daily_token_quota).await
    }

    /// Issue a credential for an unauthenticated demo caller, keyed by
    /// client IP and bounded by the demo daily quota.
    pub async fn issue_for_demo(&self, client_ip: &str) -> AppResult<IssuedCredential> {
        let key = format!("demo-{}", client_ip);
        self.issue(&key, Some(self.config.demo_daily_token_quota)).await
    }

    async fn issue(&self, principal_key: &str, quota: Option<i64>) -> AppResult<IssuedCredential> {
        // Every request counts against the daily quota, cache hit or not.
        if let Some(limit) = quota {
            let today = Utc::now().date_naive();
            let used = self
                .assessment_repo
                .increment_credential_quota(principal_key, today)
                .await?;

            if used > limit {
                let reset_at = today
                    .succ_opt()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(Utc::now);
                return Err(AppError::RateLimit {
                    limit,
                    reset_at,
                    suggestion: "Sign in for unlimited pronunciation practice, or try again tomorrow."
                        .to_string(),
                });
            }
        }

        let slot = self.issuer.slot(principal_key);
        let mut guard = slot.lock().await;

        let now = Utc::now();
        if let Some(cached) = guard.as_ref() {
            // Leave 60s of slack so the client never receives a credential
            // about to lapse mid-assessment.
            let remaining = (cached.expires_at - now).num_seconds() - 60;
            if remaining > 0 {
                return Ok(IssuedCredential {
                    token: cached.token.clone(),
                    region: self.provider.region().to_string(),
                    expires_in: remaining,
                });
            }
        }

        let token = self.provider.issue_token().await?;
        let ttl = self.config.speech_token_ttl_secs;
        *guard = Some(CachedCredential {
            token: token.clone(),
            expires_at: now + Duration::seconds(ttl),
        });

        Ok(IssuedCredential {
            token,
            region: self.provider.region().to_string(),
            expires_in: ttl - 60,
        })
    }
}
