use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    middleware,
    routing::post,
    Extension, Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::auth::{auth_middleware, optional_auth_middleware, AuthUser};
use crate::api::schemas::{ErrorResponse, RateLimitResponse};
use crate::repositories::assessment_repo::AssessmentRepository;
use crate::repositories::classroom_repo::ClassroomRepository;
use crate::repositories::progress_repo::ProgressRepository;
use crate::repositories::student_repo::StudentRepository;
use crate::services::token_service::TokenService;
use crate::services::upload_service::UploadService;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

pub fn token_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/token", post(issue_token))
        .route_layer(middleware::from_fn_with_state(
            state,
            optional_auth_middleware,
        ))
}

pub fn upload_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/upload-analysis", post(upload_analysis))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn token_service(state: &AppState) -> TokenService {
    TokenService::new(
        AssessmentRepository::new(state.db.clone()),
        state.provider.clone(),
        state.issuer.clone(),
        state.config.clone(),
    )
}

fn upload_service(state: &AppState) -> UploadService {
    UploadService::new(
        AssessmentRepository::new(state.db.clone()),
        ProgressRepository::new(state.db.clone()),
        StudentRepository::new(state.db.clone()),
        ClassroomRepository::new(state.db.clone()),
        state.audio_store.clone(),
    )
}

/// Scoped assessment credential response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "token": "eyJhbGciOi...",
    "region": "eastasia",
    "expires_in": 540
}))]
pub struct SpeechTokenResponse {
    /// Short-lived provider token
    pub token: String,
    /// Provider region the token is valid for
    #[schema(example = "eastasia")]
    pub region: String,
    /// Seconds the client may cache the token
    #[schema(example = 540)]
    pub expires_in: i64,
}

/// Upload-analysis response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "persisted": true,
    "recording_url": "http://localhost:3000/audio/0d9f....webm"
}))]
pub struct UploadAnalysisResponse {
    pub success: bool,
    /// False for retried uploads and teacher previews
    pub persisted: bool,
    pub recording_url: Option<String>,
}

/// Issue a scoped assessment credential
///
/// Authenticated teachers and students receive a short-lived provider
/// token for browser-side assessment. Unauthenticated demo callers are
/// served under a per-IP daily quota.
///
/// # Returns
/// - `200 OK`: Credential issued
/// - `429 Too Many Requests`: Daily quota exhausted
#[utoipa::path(
    post,
    path = "/azure-speech/token",
    tag = "Speech",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Credential issued", body = SpeechTokenResponse),
        (status = 429, description = "Daily quota exhausted", body = RateLimitResponse),
        (status = 502, description = "Provider unavailable", body = ErrorResponse)
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    auth_user: Option<Extension<AuthUser>>,
    headers: HeaderMap,
) -> AppResult<Json<SpeechTokenResponse>> {
    let service = token_service(&state);

    let credential = match auth_user {
        Some(Extension(user)) => service.issue_for_principal(&user.role, user.id).await?,
        None => {
            let client_ip = client_ip_from_headers(&headers);
            service.issue_for_demo(&client_ip).await?
        }
    };

    Ok(Json(SpeechTokenResponse {
        token: credential.token,
        region: credential.region,
        expires_in: credential.expires_in,
    }))
}

fn client_ip_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "local".to_string())
}

/// Upload a completed assessment
///
/// Multipart fields: `audio_file`, `analysis_json`, `latency_ms`,
/// `analysis_id`, `progress_id` (optional). Idempotent on `analysis_id`:
/// retried uploads succeed without re-persisting or re-debiting. Teacher
/// principals are preview-only and skip persistence.
#[utoipa::path(
    post,
    path = "/speech/upload-analysis",
    tag = "Speech",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Analysis recorded", body = UploadAnalysisResponse),
        (status = 400, description = "Missing or malformed field", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Progress row not found", body = ErrorResponse)
    )
)]
pub async fn upload_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadAnalysisResponse>> {
    let mut audio: Option<Vec<u8>> = None;
    let mut analysis_json: Option<serde_json::Value> = None;
    let mut latency_ms: Option<i32> = None;
    let mut analysis_id: Option<Uuid> = None;
    let mut progress_id: Option<i32> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio_file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid audio field: {}", e)))?;
                audio = Some(bytes.to_vec());
            }
            "analysis_json" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid analysis field: {}", e)))?;
                // An unparseable blob still records the attempt; the item
                // keeps its recording and stays unscored.
                analysis_json =
                    Some(serde_json::from_str(&text).unwrap_or(serde_json::Value::Null));
            }
            "latency_ms" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid latency field: {}", e)))?;
                latency_ms = text.parse().ok();
            }
            "analysis_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid analysis_id: {}", e)))?;
                analysis_id = Some(
                    Uuid::parse_str(text.trim())
                        .map_err(|_| AppError::Validation("analysis_id must be a UUID".into()))?,
                );
            }
            "progress_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid progress_id: {}", e)))?;
                progress_id = text.parse().ok();
            }
            _ => {}
        }
    }

    let audio =
        audio.ok_or_else(|| AppError::Validation("audio_file field is required".to_string()))?;
    let analysis_id = analysis_id
        .ok_or_else(|| AppError::Validation("analysis_id field is required".to_string()))?;
    let analysis_json = analysis_json.unwrap_or(serde_json::Value::Null);

    let outcome = upload_service(&state)
        .upload_analysis(
            &auth_user,
            audio,
            analysis_json,
            latency_ms,
            analysis_id,
            progress_id,
        )
        .await?;

    Ok(Json(UploadAnalysisResponse {
        success: true,
        persisted: outcome.persisted,
        recording_url: outcome.recording_url,
    }))
}
