pub mod assessment_repo;
pub mod assignment_repo;
pub mod classroom_repo;
pub mod organization_repo;
pub mod progress_repo;
pub mod school_repo;
pub mod student_repo;
pub mod teacher_repo;
