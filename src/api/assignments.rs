use std::time::Duration;

use axum::{
    extract::{Path, State},
    middleware,
    routing::post,
    Extension, Json, Router,
};

use crate::api::middleware::auth::{auth_middleware, require_teacher, AuthUser};
use crate::api::schemas::ErrorResponse;
use crate::services::grading_service::{GradingService, StudentResult};
use crate::utils::error::AppResult;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:id/batch-grade", post(batch_grade))
        .route_layer(middleware::from_fn(require_teacher))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn grading_service(state: &AppState) -> GradingService {
    GradingService::new(
        state.db.clone(),
        state.authz.clone(),
        state.provider.clone(),
        state.audio_store.clone(),
        state.http.clone(),
        state.config.grading_worker_pool_size,
        Duration::from_secs(state.config.grading_item_timeout_secs),
    )
}

/// Batch-grade an assignment
///
/// Assesses every student item that has a recording but no score, then
/// writes per-item scores and feedback plus per-student aggregate
/// feedback. Individual provider failures leave the item unscored and
/// never fail the request; per-student persistence is atomic.
///
/// # Returns
/// - `200 OK`: Per-student results (students with commit failures carry
///   `status: "error"`)
/// - `403 Forbidden`: Caller may not grade this assignment
/// - `404 Not Found`: Assignment does not exist
#[utoipa::path(
    post,
    path = "/assignments/{id}/batch-grade",
    tag = "Grading",
    params(("id" = i32, Path, description = "Assignment ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Per-student grading results", body = [StudentResult]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub async fn batch_grade(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<StudentResult>>> {
    let results = grading_service(&state)
        .batch_grade_assignment(auth_user.id, id)
        .await?;

    Ok(Json(results))
}
