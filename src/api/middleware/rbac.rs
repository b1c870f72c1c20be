use axum::{
    extract::{RawPathParams, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::authz::{Action, Domain, Resource};
use crate::AppState;

use super::auth::AuthUser;

/// Where a route's domain comes from: the `{id}` path parameter names
/// either an organization or a school.
#[derive(Debug, Clone, Copy)]
pub enum DomainSource {
    OrgPath,
    SchoolPath,
}

/// Declarative permission descriptor attached to a route at registration.
/// The middleware resolves the domain from the path and rejects before the
/// handler runs; handlers and services never see unauthorized requests.
#[derive(Debug, Clone, Copy)]
pub struct PermissionSpec {
    pub resource: Resource,
    pub action: Action,
    pub domain: DomainSource,
}

impl PermissionSpec {
    pub const fn new(resource: Resource, action: Action, domain: DomainSource) -> Self {
        Self {
            resource,
            action,
            domain,
        }
    }
}

pub async fn permission_middleware(
    State((state, spec)): State<(AppState, PermissionSpec)>,
    params: RawPathParams,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // The authorization engine only knows teacher principals.
    if !auth_user.is_teacher() {
        return Err(StatusCode::FORBIDDEN);
    }

    let id: i32 = params
        .iter()
        .find(|(name, _)| *name == "id")
        .and_then(|(_, value)| value.parse().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let domain = match spec.domain {
        DomainSource::OrgPath => Domain::Org(id),
        DomainSource::SchoolPath => Domain::School(id),
    };

    if !state
        .authz
        .check(auth_user.id, spec.resource, spec.action, domain)
    {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
