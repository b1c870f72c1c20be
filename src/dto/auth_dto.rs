use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Teacher registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "email": "teacher@duotopia.com",
    "password": "password123",
    "name": "Ms. Lin"
}))]
pub struct RegisterRequest {
    /// Teacher email address
    #[validate(email)]
    #[schema(example = "teacher@duotopia.com", format = "email")]
    pub email: String,

    /// Password (minimum 8 characters)
    #[validate(length(min = 8))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    /// Display name (minimum 2 characters)
    #[validate(length(min = 2))]
    #[schema(example = "Ms. Lin", min_length = 2)]
    pub name: String,
}

/// Teacher login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "email": "teacher@duotopia.com",
    "password": "password123"
}))]
pub struct LoginRequest {
    /// Teacher email address
    #[validate(email)]
    #[schema(example = "teacher@duotopia.com", format = "email")]
    pub email: String,

    /// Password
    #[schema(example = "password123")]
    pub password: String,
}

/// Student login request. Students sign in with their classroom, name and
/// password instead of an email.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "classroom_id": 3,
    "name": "王小明",
    "password": "20120101"
}))]
pub struct StudentLoginRequest {
    /// Classroom the student belongs to
    #[schema(example = 3)]
    pub classroom_id: i32,

    /// Student display name
    #[validate(length(min = 1))]
    #[schema(example = "王小明")]
    pub name: String,

    /// Password
    #[schema(example = "20120101")]
    pub password: String,
}

/// Authentication response with tokens and principal info
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "access_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
    "refresh_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
    "token_type": "Bearer",
    "expires_in": 86400,
    "principal": {
        "id": 1,
        "role": "teacher",
        "name": "Ms. Lin",
        "email": "teacher@duotopia.com"
    }
}))]
pub struct AuthResponse {
    /// JWT access token
    pub access_token: String,

    /// JWT refresh token
    pub refresh_token: String,

    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,

    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,

    /// Authenticated principal
    pub principal: PrincipalResponse,
}

/// Refresh token request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshTokenResponse {
    /// New JWT access token
    pub access_token: String,

    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,

    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// Authenticated principal information
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "role": "teacher",
    "name": "Ms. Lin",
    "email": "teacher@duotopia.com"
}))]
pub struct PrincipalResponse {
    /// Principal ID
    #[schema(example = 1)]
    pub id: i32,

    /// Principal kind ("teacher" or "student")
    #[schema(example = "teacher")]
    pub role: String,

    /// Display name
    #[schema(example = "Ms. Lin")]
    pub name: String,

    /// Email (teachers only)
    #[schema(example = "teacher@duotopia.com")]
    pub email: Option<String>,
}
