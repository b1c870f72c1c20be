use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    NotStarted,
    InProgress,
    Submitted,
    Graded,
    Returned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::NotStarted => "NOT_STARTED",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Submitted => "SUBMITTED",
            AssignmentStatus::Graded => "GRADED",
            AssignmentStatus::Returned => "RETURNED",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentAssignment {
    pub id: i32,
    pub student_id: i32,
    pub assignment_id: i32,
    pub status: String,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentContentProgress {
    pub id: i32,
    pub student_assignment_id: i32,
    pub content_id: i32,
    pub order_index: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-item progress row. The four score dimensions are all set or all
/// null, and only ever set together with `last_assessed_at`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentItemProgress {
    pub id: i32,
    pub student_assignment_id: i32,
    pub content_item_id: i32,
    pub recording_url: Option<String>,
    pub transcription: Option<String>,
    pub accuracy_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub pronunciation_score: Option<f64>,
    pub completeness_score: Option<f64>,
    pub raw_assessment: Option<serde_json::Value>,
    pub item_feedback: Option<String>,
    pub last_assessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentItemProgress {
    /// Eligible for batch assessment: has a recording, never assessed.
    pub fn is_eligible_for_assessment(&self) -> bool {
        self.recording_url.is_some() && self.last_assessed_at.is_none()
    }

    pub fn has_scores(&self) -> bool {
        self.accuracy_score.is_some()
    }
}
