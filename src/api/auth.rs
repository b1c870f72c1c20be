use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use validator::Validate;

use crate::api::middleware::auth::{auth_middleware, AuthUser};
use crate::api::schemas::ErrorResponse;
use crate::dto::auth_dto::{
    AuthResponse, LoginRequest, PrincipalResponse, RefreshTokenRequest, RefreshTokenResponse,
    RegisterRequest, StudentLoginRequest,
};
use crate::repositories::student_repo::StudentRepository;
use crate::repositories::teacher_repo::TeacherRepository;
use crate::services::auth_service::AuthService;
use crate::utils::error::AppResult;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(get_current_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/student/login", post(student_login))
        .route("/refresh", post(refresh_token))
        .merge(protected)
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        TeacherRepository::new(state.db.clone()),
        StudentRepository::new(state.db.clone()),
        state.config.clone(),
    )
}

/// Register a teacher account
///
/// # Returns
/// - `201 Created`: Account created
/// - `409 Conflict`: Email already registered
/// - `400 Bad Request`: Validation error
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = PrincipalResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PrincipalResponse>)> {
    payload.validate().map_err(|e| {
        crate::utils::error::AppError::Validation(format!("Validation error: {}", e))
    })?;

    let principal = auth_service(&state)
        .register_teacher(&payload.email, &payload.password, &payload.name)
        .await?;

    Ok((StatusCode::CREATED, Json(principal)))
}

/// Teacher login
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate().map_err(|e| {
        crate::utils::error::AppError::Validation(format!("Validation error: {}", e))
    })?;

    let response = auth_service(&state)
        .login_teacher(&payload.email, &payload.password)
        .await?;

    Ok(Json(response))
}

/// Student login
///
/// Students sign in with classroom, name and password.
#[utoipa::path(
    post,
    path = "/auth/student/login",
    tag = "Authentication",
    request_body = StudentLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn student_login(
    State(state): State<AppState>,
    Json(payload): Json<StudentLoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate().map_err(|e| {
        crate::utils::error::AppError::Validation(format!("Validation error: {}", e))
    })?;

    let response = auth_service(&state)
        .login_student(payload.classroom_id, &payload.name, &payload.password)
        .await?;

    Ok(Json(response))
}

/// Exchange a refresh token for a fresh access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Authentication",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token refreshed", body = RefreshTokenResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<Json<RefreshTokenResponse>> {
    let response = auth_service(&state)
        .refresh_token(&payload.refresh_token)
        .await?;

    Ok(Json(response))
}

/// Current principal from the bearer token
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current principal", body = PrincipalResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn get_current_user(
    Extension(auth_user): Extension<AuthUser>,
) -> Json<PrincipalResponse> {
    Json(PrincipalResponse {
        id: auth_user.id,
        role: auth_user.role,
        name: auth_user.name,
        email: auth_user.email,
    })
}
