use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,           // teacher or student id
    pub role: String,       // "teacher" or "student"
    pub name: String,
    pub email: Option<String>, // students have no email
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access" or "refresh"
}

pub fn generate_token(
    principal_id: i32,
    role: &str,
    name: String,
    email: Option<String>,
    secret: &str,
    expiration_hours: i64,
) -> AppResult<String> {
    generate_token_with_type(
        principal_id,
        role,
        name,
        email,
        secret,
        expiration_hours,
        "access",
    )
}

pub fn generate_token_with_type(
    principal_id: i32,
    role: &str,
    name: String,
    email: Option<String>,
    secret: &str,
    expiration_hours: i64,
    token_type: &str,
) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: principal_id,
        role: role.to_string(),
        name,
        email,
        exp: exp.timestamp(),
        iat: now.timestamp(),
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

pub fn generate_refresh_token(
    principal_id: i32,
    role: &str,
    name: String,
    email: Option<String>,
    secret: &str,
) -> AppResult<String> {
    // Refresh token expires in 7 days
    generate_token_with_type(
        principal_id,
        role,
        name,
        email,
        secret,
        24 * 7,
        "refresh",
    )
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
}

pub fn verify_refresh_token(token: &str, secret: &str) -> AppResult<Claims> {
    let claims = verify_token(token, secret)?;

    if claims.token_type != "refresh" {
        return Err(AppError::Authentication("Invalid token type".to_string()));
    }

    Ok(claims)
}
