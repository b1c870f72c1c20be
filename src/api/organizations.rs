use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::middleware::auth::{auth_middleware, require_teacher, AuthUser};
use crate::api::middleware::rbac::{self, DomainSource, PermissionSpec};
use crate::api::schemas::{ErrorResponse, MessageResponse};
use crate::authz::{Action, Resource};
use crate::models::organization::Organization;
use crate::repositories::organization_repo::OrganizationRepository;
use crate::repositories::school_repo::SchoolRepository;
use crate::services::organization_service::OrganizationService;
use crate::utils::error::AppResult;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_organizations).post(create_organization))
        .route(
            "/:id",
            get(get_organization)
                .patch(update_organization)
                .delete(delete_organization),
        )
        .merge(guarded(
            &state,
            "/:id/teachers",
            get(list_teachers).post(add_teacher),
            PermissionSpec::new(Resource::Teacher, Action::Read, DomainSource::OrgPath),
        ))
        .merge(guarded(
            &state,
            "/:id/teachers/:tid",
            delete(remove_teacher),
            PermissionSpec::new(Resource::Teacher, Action::Delete, DomainSource::OrgPath),
        ))
        .route_layer(middleware::from_fn(require_teacher))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Attach a declarative permission descriptor to a route: membership in
/// the domain is verified before the handler runs, the service enforces
/// the precise action.
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

fn organization_service(state: &AppState) -> OrganizationService {
    OrganizationService::new(
        OrganizationRepository::new(state.db.clone()),
        SchoolRepository::new(state.db.clone()),
        state.authz.clone(),
    )
}

/// Create organization request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "sunrise-language-group",
    "display_name": "Sunrise Language Group"
}))]
pub struct CreateOrganizationRequest {
    /// Organization name (minimum 3 characters)
    #[validate(length(min = 3))]
    #[schema(example = "sunrise-language-group", min_length = 3)]
    pub name: String,

    /// Display name
    #[schema(example = "Sunrise Language Group")]
    pub display_name: Option<String>,

    /// Settings map
    pub settings: Option<serde_json::Value>,
}

/// Update organization request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    /// Display name
    pub display_name: Option<String>,

    /// Settings map
    pub settings: Option<serde_json::Value>,

    /// Set true to re-activate a soft-deleted organization
    pub is_active: Option<bool>,
}

/// Organization response
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "name": "sunrise-language-group",
    "display_name": "Sunrise Language Group",
    "is_active": true
}))]
pub struct OrganizationResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "sunrise-language-group")]
    pub name: String,
    #[schema(example = "Sunrise Language Group")]
    pub display_name: Option<String>,
    #[schema(example = true)]
    pub is_active: bool,
    pub settings: serde_json::Value,
}

impl From<Organization> for OrganizationResponse {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            display_name: org.display_name,
            is_active: org.is_active,
            settings: org.settings,
        }
    }
}

/// Organization teacher entry
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "name": "Ms. Lin",
    "email": "lin@duotopia.com",
    "role": "org_admin"
}))]
pub struct OrganizationTeacherResponse {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = "Ms. Lin")]
    pub name: String,
    #[schema(example = "lin@duotopia.com")]
    pub email: String,
    /// org_owner or org_admin
    #[schema(example = "org_admin")]
    pub role: String,
}

/// Add teacher to organization request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"teacher_id": 7, "role": "org_admin"}))]
pub struct AddOrganizationTeacherRequest {
    #[schema(example = 7)]
    pub teacher_id: i32,
    /// org_owner or org_admin
    #[schema(example = "org_admin")]
    pub role: String,
}

/// Create organization
///
/// The caller becomes the organization's org_owner.
#[utoipa::path(
    post,
    path = "/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateOrganizationRequest>,
) -> AppResult<(StatusCode, Json<OrganizationResponse>)> {
    payload.validate().map_err(|e| {
        crate::utils::error::AppError::Validation(format!("Validation error: {}", e))
    })?;

    let org = organization_service(&state)
        .create_organization(
            auth_user.id,
            payload.name,
            payload.display_name,
            payload.settings,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(org.into())))
}

/// List organizations visible to the caller
#[utoipa::path(
    get,
    path = "/organizations",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visible organizations", body = [OrganizationResponse]),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<OrganizationResponse>>> {
    let orgs = organization_service(&state)
        .list_organizations(auth_user.id)
        .await?;

    Ok(Json(orgs.into_iter().map(|o| o.into()).collect()))
}

/// Get organization details
#[utoipa::path(
    get,
    path = "/organizations/{id}",
    tag = "Organizations",
    params(("id" = i32, Path, description = "Organization ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Organization details", body = OrganizationResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<OrganizationResponse>> {
    let org = organization_service(&state)
        .get_organization(auth_user.id, id)
        .await?;

    Ok(Json(org.into()))
}

/// Update organization
///
/// Also the re-activation path: `is_active: true` restores a soft-deleted
/// organization and re-establishes its grants.
#[utoipa::path(
    patch,
    path = "/organizations/{id}",
    tag = "Organizations",
    params(("id" = i32, Path, description = "Organization ID")),
    request_body = UpdateOrganizationRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Organization updated", body = OrganizationResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateOrganizationRequest>,
) -> AppResult<Json<OrganizationResponse>> {
    let org = organization_service(&state)
        .update_organization(
            auth_user.id,
            id,
            payload.display_name,
            payload.settings,
            payload.is_active,
        )
        .await?;

    Ok(Json(org.into()))
}

/// Delete organization (soft)
///
/// Sets active=false and cascades to owned schools and membership rows.
/// Classrooms survive; their school link is removed.
#[utoipa::path(
    delete,
    path = "/organizations/{id}",
    tag = "Organizations",
    params(("id" = i32, Path, description = "Organization ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Organization deactivated", body = MessageResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_organization(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    organization_service(&state)
        .delete_organization(auth_user.id, id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Organization deactivated successfully".to_string(),
    }))
}

/// List organization teachers
#[utoipa::path(
    get,
    path = "/organizations/{id}/teachers",
    tag = "Organizations",
    params(("id" = i32, Path, description = "Organization ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Organization teachers", body = [OrganizationTeacherResponse]),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn list_teachers(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<OrganizationTeacherResponse>>> {
    let teachers = organization_service(&state)
        .list_teachers(auth_user.id, id)
        .await?;

    Ok(Json(
        teachers
            .into_iter()
            .map(|(id, name, email, role)| OrganizationTeacherResponse {
                id,
                name,
                email,
                role,
            })
            .collect(),
    ))
}

/// Add teacher to organization
///
/// # Business Rules
/// - Role must be org_owner or org_admin
/// - An organization has at most one org_owner
#[utoipa::path(
    post,
    path = "/organizations/{id}/teachers",
    tag = "Organizations",
    params(("id" = i32, Path, description = "Organization ID")),
    request_body = AddOrganizationTeacherRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Teacher added", body = MessageResponse),
        (status = 400, description = "Unknown role", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 409, description = "Organization already has an owner", body = ErrorResponse)
    )
)]
pub async fn add_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<AddOrganizationTeacherRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    organization_service(&state)
        .add_teacher(auth_user.id, id, payload.teacher_id, &payload.role)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Teacher added to organization".to_string(),
        }),
    ))
}

/// Remove teacher from organization
#[utoipa::path(
    delete,
    path = "/organizations/{id}/teachers/{tid}",
    tag = "Organizations",
    params(
        ("id" = i32, Path, description = "Organization ID"),
        ("tid" = i32, Path, description = "Teacher ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Teacher removed", body = MessageResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn remove_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((id, tid)): Path<(i32, i32)>,
) -> AppResult<Json<MessageResponse>> {
    organization_service(&state)
        .remove_teacher(auth_user.id, id, tid)
        .await?;

    Ok(Json(MessageResponse {
        message: "Teacher removed from organization".to_string(),
    }))
}
