pub mod auth_service;
pub mod classroom_service;
pub mod feedback;
pub mod grading_service;
pub mod organization_service;
pub mod school_service;
pub mod token_service;
pub mod upload_queue;
pub mod upload_service;
