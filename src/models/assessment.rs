use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One speech-assessment attempt. `analysis_id` is the client-chosen
/// idempotency key; the unique index on it makes retried uploads no-ops.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AssessmentAttempt {
    pub id: i32,
    pub student_item_progress_id: Option<i32>,
    pub analysis_id: Uuid,
    pub latency_ms: Option<i32>,
    pub raw_assessment: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuotaLedgerEntry {
    pub id: i32,
    pub teacher_id: i32,
    pub reason: String,
    pub analysis_id: Uuid,
    pub delta: i32,
    pub created_at: DateTime<Utc>,
}

/// The four pronunciation dimensions returned by the provider,
/// each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub accuracy: f64,
    pub fluency: f64,
    pub pronunciation: f64,
    pub completeness: f64,
}

impl DimensionScores {
    pub fn is_valid(&self) -> bool {
        [
            self.accuracy,
            self.fluency,
            self.pronunciation,
            self.completeness,
        ]
        .iter()
        .all(|s| (0.0..=100.0).contains(s))
    }
}
