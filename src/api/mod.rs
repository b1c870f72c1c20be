use axum::Router;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

pub mod assignments;
pub mod auth;
pub mod classrooms;
pub mod health;
pub mod middleware;
pub mod openapi;
pub mod organizations;
pub mod schemas;
pub mod schools;
pub mod speech;

use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth::routes(state.clone()))
        .nest("/organizations", organizations::routes(state.clone()))
        .nest("/schools", schools::routes(state.clone()))
        .nest("/classrooms", classrooms::routes(state.clone()))
        .nest("/azure-speech", speech::token_routes(state.clone()))
        .nest("/speech", speech::upload_routes(state.clone()))
        .nest("/assignments", assignments::routes(state.clone()))
        .nest("/health", health::routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .merge(Redoc::with_url("/redoc", openapi::ApiDoc::openapi()))
        .merge(RapiDoc::new("/api-docs/openapi.json").path("/rapidoc"))
        .with_state(state)
}
