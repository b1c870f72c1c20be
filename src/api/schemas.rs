use serde::Serialize;
use utoipa::ToSchema;

/// Generic error response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"error": "Not found: School not found"}))]
pub struct ErrorResponse {
    /// Error message
    #[schema(example = "Not found: School not found")]
    pub error: String,
}

/// Rate-limit error response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "error": "daily_limit_exceeded",
    "limit": 60,
    "reset_at": "2025-06-02T00:00:00+00:00",
    "suggestion": "Sign in for unlimited pronunciation practice, or try again tomorrow."
}))]
pub struct RateLimitResponse {
    #[schema(example = "daily_limit_exceeded")]
    pub error: String,

    /// Daily request ceiling for this principal
    #[schema(example = 60)]
    pub limit: i64,

    /// When the counter resets (ISO 8601)
    #[schema(example = "2025-06-02T00:00:00+00:00")]
    pub reset_at: String,

    #[schema(example = "Sign in for unlimited pronunciation practice, or try again tomorrow.")]
    pub suggestion: String,
}

/// Success message response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"message": "Operation completed successfully"}))]
pub struct MessageResponse {
    #[schema(example = "Operation completed successfully")]
    pub message: String,
}
