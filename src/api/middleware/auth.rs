use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::utils::jwt;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub role: String,
    pub name: String,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn is_teacher(&self) -> bool {
        self.role == "teacher"
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Extract Authorization header
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = auth_header.trim_start_matches("Bearer ");

    let claims = jwt::verify_token(token, &state.config.jwt_secret)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Ensure it's an access token
    if claims.token_type != "access" {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let auth_user = AuthUser {
        id: claims.sub,
        role: claims.role,
        name: claims.name,
        email: claims.email,
    };

    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}

/// Like `auth_middleware`, but a missing or invalid token falls through as
/// an anonymous request. The speech-token endpoint uses this to serve
/// demo callers under the per-IP quota.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if let Some(token) = token {
        if let Ok(claims) = jwt::verify_token(token, &state.config.jwt_secret) {
            if claims.token_type == "access" {
                req.extensions_mut().insert(AuthUser {
                    id: claims.sub,
                    role: claims.role,
                    name: claims.name,
                    email: claims.email,
                });
            }
        }
    }

    next.run(req).await
}

pub async fn require_teacher(req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth_user.is_teacher() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
