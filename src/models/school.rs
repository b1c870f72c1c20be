use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct School {
    pub id: i32,
    pub organization_id: i32,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of a teacher in a school. `roles` is a non-empty subset of
/// {school_admin, teacher}.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TeacherSchool {
    pub id: i32,
    pub teacher_id: i32,
    pub school_id: i32,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassroomSchool {
    pub id: i32,
    pub classroom_id: i32,
    pub school_id: i32,
    pub created_at: DateTime<Utc>,
}
