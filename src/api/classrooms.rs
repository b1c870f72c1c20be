use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::middleware::auth::{auth_middleware, require_teacher, AuthUser};
use crate::api::schemas::{ErrorResponse, MessageResponse};
use crate::models::school::ClassroomSchool;
use crate::repositories::classroom_repo::ClassroomRepository;
use crate::repositories::school_repo::SchoolRepository;
use crate::services::classroom_service::ClassroomService;
use crate::utils::error::AppResult;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:id/school",
            post(link_school).get(get_school_link).delete(unlink_school),
        )
        .route_layer(middleware::from_fn(require_teacher))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn classroom_service(state: &AppState) -> ClassroomService {
    ClassroomService::new(
        ClassroomRepository::new(state.db.clone()),
        SchoolRepository::new(state.db.clone()),
        state.authz.clone(),
    )
}

/// Link classroom to school request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"school_id": 3}))]
pub struct LinkSchoolRequest {
    #[schema(example = 3)]
    pub school_id: i32,
}

/// Classroom-school link response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"classroom_id": 5, "school_id": 3}))]
pub struct ClassroomSchoolResponse {
    #[schema(example = 5)]
    pub classroom_id: i32,
    #[schema(example = 3)]
    pub school_id: i32,
}

impl From<ClassroomSchool> for ClassroomSchoolResponse {
    fn from(link: ClassroomSchool) -> Self {
        Self {
            classroom_id: link.classroom_id,
            school_id: link.school_id,
        }
    }
}

/// Link classroom to school
///
/// A classroom links to at most one school; linking an already linked
/// classroom is a conflict.
#[utoipa::path(
    post,
    path = "/classrooms/{id}/school",
    tag = "Classrooms",
    params(("id" = i32, Path, description = "Classroom ID")),
    request_body = LinkSchoolRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Classroom linked", body = ClassroomSchoolResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 409, description = "Classroom already linked", body = ErrorResponse)
    )
)]
pub async fn link_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<LinkSchoolRequest>,
) -> AppResult<(StatusCode, Json<ClassroomSchoolResponse>)> {
    let link = classroom_service(&state)
        .link_to_school(auth_user.id, id, payload.school_id)
        .await?;

    Ok((StatusCode::CREATED, Json(link.into())))
}

/// Get a classroom's school link
#[utoipa::path(
    get,
    path = "/classrooms/{id}/school",
    tag = "Classrooms",
    params(("id" = i32, Path, description = "Classroom ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "School link", body = ClassroomSchoolResponse),
        (status = 404, description = "Classroom not linked", body = ErrorResponse)
    )
)]
pub async fn get_school_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<ClassroomSchoolResponse>> {
    let link = classroom_service(&state)
        .get_school_link(auth_user.id, id)
        .await?;

    Ok(Json(link.into()))
}

/// Remove a classroom's school link
#[utoipa::path(
    delete,
    path = "/classrooms/{id}/school",
    tag = "Classrooms",
    params(("id" = i32, Path, description = "Classroom ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Classroom unlinked", body = MessageResponse),
        (status = 404, description = "Classroom not linked", body = ErrorResponse)
    )
)]
pub async fn unlink_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    classroom_service(&state)
        .unlink_from_school(auth_user.id, id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Classroom unlinked from school".to_string(),
    }))
}
