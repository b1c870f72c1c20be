use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::Modify;
use utoipa::OpenApi;

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Duotopia Backend API",
        version = "0.1.0",
        description = "Language-learning platform backend: organization hierarchy & authorization, speech-assessment pipeline, and batch auto-grading.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Development server")
    ),
    paths(
        // System
        crate::api::health::health_check,

        // Authentication
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::student_login,
        crate::api::auth::refresh_token,
        crate::api::auth::get_current_user,

        // Organizations
        crate::api::organizations::create_organization,
        crate::api::organizations::list_organizations,
        crate::api::organizations::get_organization,
        crate::api::organizations::update_organization,
        crate::api::organizations::delete_organization,
        crate::api::organizations::list_teachers,
        crate::api::organizations::add_teacher,
        crate::api::organizations::remove_teacher,

        // Schools
        crate::api::schools::create_school,
        crate::api::schools::list_schools,
        crate::api::schools::get_school,
        crate::api::schools::update_school,
        crate::api::schools::delete_school,
        crate::api::schools::list_teachers,
        crate::api::schools::add_teacher,
        crate::api::schools::update_teacher_roles,
        crate::api::schools::remove_teacher,
        crate::api::schools::list_classrooms,

        // Classrooms
        crate::api::classrooms::link_school,
        crate::api::classrooms::get_school_link,
        crate::api::classrooms::unlink_school,

        // Speech assessment
        crate::api::speech::issue_token,
        crate::api::speech::upload_analysis,

        // Batch grading
        crate::api::assignments::batch_grade,
    ),
    components(
        schemas(
            // Auth DTOs
            crate::dto::auth_dto::RegisterRequest,
            crate::dto::auth_dto::LoginRequest,
            crate::dto::auth_dto::StudentLoginRequest,
            crate::dto::auth_dto::AuthResponse,
            crate::dto::auth_dto::RefreshTokenRequest,
            crate::dto::auth_dto::RefreshTokenResponse,
            crate::dto::auth_dto::PrincipalResponse,

            // Organization DTOs
            crate::api::organizations::CreateOrganizationRequest,
            crate::api::organizations::UpdateOrganizationRequest,
            crate::api::organizations::OrganizationResponse,
            crate::api::organizations::OrganizationTeacherResponse,
            crate::api::organizations::AddOrganizationTeacherRequest,

            // School DTOs
            crate::api::schools::CreateSchoolRequest,
            crate::api::schools::UpdateSchoolRequest,
            crate::api::schools::SchoolResponse,
            crate::api::schools::SchoolTeacherResponse,
            crate::api::schools::AddSchoolTeacherRequest,
            crate::api::schools::UpdateSchoolTeacherRequest,
            crate::api::schools::ClassroomResponse,

            // Classroom DTOs
            crate::api::classrooms::LinkSchoolRequest,
            crate::api::classrooms::ClassroomSchoolResponse,

            // Speech DTOs
            crate::api::speech::SpeechTokenResponse,
            crate::api::speech::UploadAnalysisResponse,

            // Grading DTOs
            crate::services::grading_service::StudentResult,

            // System
            crate::api::health::HealthResponse,

            // Errors
            crate::api::schemas::ErrorResponse,
            crate::api::schemas::RateLimitResponse,
            crate::api::schemas::MessageResponse,
        )
    ),
    tags(
        (name = "Authentication", description = "Teacher and student authentication"),
        (name = "Organizations", description = "Organization hierarchy and org-level membership"),
        (name = "Schools", description = "Schools, school membership, classroom links"),
        (name = "Classrooms", description = "Classroom-school link management"),
        (name = "Speech", description = "Scoped assessment credentials and analysis uploads"),
        (name = "Grading", description = "Batch auto-grading"),
        (name = "System", description = "Health and diagnostics"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme for JWT Bearer token
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token in the format: Bearer <token>"))
                        .build(),
                ),
            );
        }
    }
}
