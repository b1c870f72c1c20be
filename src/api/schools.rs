use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::middleware::auth::{auth_middleware, require_teacher, AuthUser};
use crate::api::middleware::rbac::{self, DomainSource, PermissionSpec};
use crate::api::schemas::{ErrorResponse, MessageResponse};
use crate::authz::{Action, Resource};
use crate::models::classroom::Classroom;
use crate::models::school::School;
use crate::repositories::classroom_repo::ClassroomRepository;
use crate::repositories::organization_repo::OrganizationRepository;
use crate::repositories::school_repo::SchoolRepository;
use crate::services::classroom_service::ClassroomService;
use crate::services::school_service::SchoolService;
use crate::utils::error::AppResult;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_schools).post(create_school))
        .merge(guarded(
            &state,
            "/:id",
            get(get_school).patch(update_school).delete(delete_school),
            PermissionSpec::new(Resource::School, Action::Read, DomainSource::SchoolPath),
        ))
        .merge(guarded(
            &state,
            "/:id/teachers",
            get(list_teachers).post(add_teacher),
            PermissionSpec::new(Resource::Teacher, Action::Read, DomainSource::SchoolPath),
        ))
        .merge(guarded(
            &state,
            "/:id/teachers/:tid",
            patch(update_teacher_roles).delete(remove_teacher),
            PermissionSpec::new(Resource::Teacher, Action::Read, DomainSource::SchoolPath),
        ))
        .merge(guarded(
            &state,
            "/:id/classrooms",
            get(list_classrooms),
            PermissionSpec::new(Resource::Classroom, Action::Read, DomainSource::SchoolPath),
        ))
        .route_layer(middleware::from_fn(require_teacher))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Domain-membership pre-gate; the service enforces the precise action.
fn guarded(
    state: &AppState,
    path: &str,
    method_router: axum::routing::MethodRouter<AppState>,
    spec: PermissionSpec,
) -> Router<AppState> {
    Router::new().route(
        path,
        method_router.route_layer(middleware::from_fn_with_state(
            (state.clone(), spec),
            rbac::permission_middleware,
        )),
    )
}

fn school_service(state: &AppState) -> SchoolService {
    SchoolService::new(
        SchoolRepository::new(state.db.clone()),
        OrganizationRepository::new(state.db.clone()),
        state.authz.clone(),
    )
}

fn classroom_service(state: &AppState) -> ClassroomService {
    ClassroomService::new(
        ClassroomRepository::new(state.db.clone()),
        SchoolRepository::new(state.db.clone()),
        state.authz.clone(),
    )
}

/// Create school request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"organization_id": 1, "name": "Sunrise Elementary"}))]
pub struct CreateSchoolRequest {
    /// Owning organization
    #[schema(example = 1)]
    pub organization_id: i32,

    /// School name (minimum 2 characters)
    #[validate(length(min = 2))]
    #[schema(example = "Sunrise Elementary", min_length = 2)]
    pub name: String,
}

/// Update school request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSchoolRequest {
    /// School name (minimum 2 characters)
    #[validate(length(min = 2))]
    pub name: Option<String>,
}

/// School response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 3,
    "organization_id": 1,
    "name": "Sunrise Elementary",
    "is_active": true
}))]
pub struct SchoolResponse {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = 1)]
    pub organization_id: i32,
    #[schema(example = "Sunrise Elementary")]
    pub name: String,
    #[schema(example = true)]
    pub is_active: bool,
}

impl From<School> for SchoolResponse {
    fn from(school: School) -> Self {
        Self {
            id: school.id,
            organization_id: school.organization_id,
            name: school.name,
            is_active: school.is_active,
        }
    }
}

/// School teacher entry
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "name": "Ms. Lin",
    "email": "lin@duotopia.com",
    "roles": ["school_admin", "teacher"]
}))]
pub struct SchoolTeacherResponse {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = "Ms. Lin")]
    pub name: String,
    #[schema(example = "lin@duotopia.com")]
    pub email: String,
    /// Subset of {school_admin, teacher}
    pub roles: Vec<String>,
}

/// Add teacher to school request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"teacher_id": 7, "roles": ["teacher"]}))]
pub struct AddSchoolTeacherRequest {
    #[schema(example = 7)]
    pub teacher_id: i32,
    /// Non-empty subset of {school_admin, teacher}
    pub roles: Vec<String>,
}

/// Replace teacher roles request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"roles": ["school_admin"]}))]
pub struct UpdateSchoolTeacherRequest {
    /// Non-empty subset of {school_admin, teacher}
    pub roles: Vec<String>,
}

/// Classroom response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"id": 5, "teacher_id": 7, "name": "五年甲班"}))]
pub struct ClassroomResponse {
    #[schema(example = 5)]
    pub id: i32,
    #[schema(example = 7)]
    pub teacher_id: i32,
    #[schema(example = "五年甲班")]
    pub name: String,
}

impl From<Classroom> for ClassroomResponse {
    fn from(classroom: Classroom) -> Self {
        Self {
            id: classroom.id,
            teacher_id: classroom.teacher_id,
            name: classroom.name,
        }
    }
}

/// Create school
///
/// Requires school.create in the owning organization's domain.
#[utoipa::path(
    post,
    path = "/schools",
    tag = "Schools",
    request_body = CreateSchoolRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "School created", body = SchoolResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    )
)]
pub async fn create_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateSchoolRequest>,
) -> AppResult<(StatusCode, Json<SchoolResponse>)> {
    payload.validate().map_err(|e| {
        crate::utils::error::AppError::Validation(format!("Validation error: {}", e))
    })?;

    let school = school_service(&state)
        .create_school(auth_user.id, payload.organization_id, payload.name)
        .await?;

    Ok((StatusCode::CREATED, Json(school.into())))
}

/// List schools visible to the caller
#[utoipa::path(
    get,
    path = "/schools",
    tag = "Schools",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visible schools", body = [SchoolResponse]),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_schools(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<SchoolResponse>>> {
    let schools = school_service(&state).list_schools(auth_user.id).await?;

    Ok(Json(schools.into_iter().map(|s| s.into()).collect()))
}

/// Get school details
#[utoipa::path(
    get,
    path = "/schools/{id}",
    tag = "Schools",
    params(("id" = i32, Path, description = "School ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "School details", body = SchoolResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<SchoolResponse>> {
    let school = school_service(&state).get_school(auth_user.id, id).await?;

    Ok(Json(school.into()))
}

/// Update school
#[utoipa::path(
    patch,
    path = "/schools/{id}",
    tag = "Schools",
    params(("id" = i32, Path, description = "School ID")),
    request_body = UpdateSchoolRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "School updated", body = SchoolResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn update_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateSchoolRequest>,
) -> AppResult<Json<SchoolResponse>> {
    payload.validate().map_err(|e| {
        crate::utils::error::AppError::Validation(format!("Validation error: {}", e))
    })?;

    let school = school_service(&state)
        .update_school(auth_user.id, id, payload.name)
        .await?;

    Ok(Json(school.into()))
}

/// Delete school (soft)
#[utoipa::path(
    delete,
    path = "/schools/{id}",
    tag = "Schools",
    params(("id" = i32, Path, description = "School ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "School deactivated", body = MessageResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    school_service(&state).delete_school(auth_user.id, id).await?;

    Ok(Json(MessageResponse {
        message: "School deactivated successfully".to_string(),
    }))
}

/// List school teachers
#[utoipa::path(
    get,
    path = "/schools/{id}/teachers",
    tag = "Schools",
    params(("id" = i32, Path, description = "School ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "School teachers", body = [SchoolTeacherResponse]),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    )
)]
pub async fn list_teachers(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<SchoolTeacherResponse>>> {
    let teachers = school_service(&state).list_teachers(auth_user.id, id).await?;

    Ok(Json(
        teachers
            .into_iter()
            .map(|(id, name, email, roles)| SchoolTeacherResponse {
                id,
                name,
                email,
                roles,
            })
            .collect(),
    ))
}

/// Add teacher to school
///
/// Union semantics: an existing membership keeps its roles and gains the
/// new ones.
#[utoipa::path(
    post,
    path = "/schools/{id}/teachers",
    tag = "Schools",
    params(("id" = i32, Path, description = "School ID")),
    request_body = AddSchoolTeacherRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Teacher added", body = MessageResponse),
        (status = 400, description = "Invalid roles", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    )
)]
pub async fn add_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<AddSchoolTeacherRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    school_service(&state)
        .add_teacher(auth_user.id, id, payload.teacher_id, payload.roles)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Teacher added to school".to_string(),
        }),
    ))
}

/// Replace a teacher's school roles
#[utoipa::path(
    patch,
    path = "/schools/{id}/teachers/{tid}",
    tag = "Schools",
    params(
        ("id" = i32, Path, description = "School ID"),
        ("tid" = i32, Path, description = "Teacher ID")
    ),
    request_body = UpdateSchoolTeacherRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Roles updated", body = MessageResponse),
        (status = 400, description = "Invalid roles", body = ErrorResponse),
        (status = 404, description = "Membership not found", body = ErrorResponse)
    )
)]
pub async fn update_teacher_roles(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((id, tid)): Path<(i32, i32)>,
    Json(payload): Json<UpdateSchoolTeacherRequest>,
) -> AppResult<Json<MessageResponse>> {
    school_service(&state)
        .update_teacher_roles(auth_user.id, id, tid, payload.roles)
        .await?;

    Ok(Json(MessageResponse {
        message: "Teacher roles updated".to_string(),
    }))
}

/// Remove teacher from school
#[utoipa::path(
    delete,
    path = "/schools/{id}/teachers/{tid}",
    tag = "Schools",
    params(
        ("id" = i32, Path, description = "School ID"),
        ("tid" = i32, Path, description = "Teacher ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Teacher removed", body = MessageResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    )
)]
pub async fn remove_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((id, tid)): Path<(i32, i32)>,
) -> AppResult<Json<MessageResponse>> {
    school_service(&state)
        .remove_teacher(auth_user.id, id, tid)
        .await?;

    Ok(Json(MessageResponse {
        message: "Teacher removed from school".to_string(),
    }))
}

/// List classrooms linked to a school
#[utoipa::path(
    get,
    path = "/schools/{id}/classrooms",
    tag = "Schools",
    params(("id" = i32, Path, description = "School ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Linked classrooms", body = [ClassroomResponse]),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    )
)]
pub async fn list_classrooms(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<ClassroomResponse>>> {
    let classrooms = classroom_service(&state)
        .list_by_school(auth_user.id, id)
        .await?;

    Ok(Json(classrooms.into_iter().map(|c| c.into()).collect()))
}
