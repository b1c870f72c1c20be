use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub id: i32,
    pub name: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of a teacher in an organization (org_owner / org_admin).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TeacherOrganization {
    pub id: i32,
    pub teacher_id: i32,
    pub organization_id: i32,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
