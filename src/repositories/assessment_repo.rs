use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::assessment::DimensionScores;
use crate::utils::error::AppResult;

/// The progress mutation attached to an uploaded analysis. Parsed scores
/// may be absent (malformed blob); the recording URL is still written so
/// the attempt counts as "no valid score".
#[derive(Debug, Clone)]
pub struct UploadProgressWrite {
    pub progress_id: i32,
    pub recording_url: String,
    pub scores: Option<DimensionScores>,
    pub transcription: Option<String>,
}

pub struct AssessmentRepository {
    pool: PgPool,
}

impl AssessmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist one uploaded analysis atomically. The insert into
    /// assessment_attempts is the idempotency gate: when a row with the
    /// same analysis_id already exists, nothing else runs and the call
    /// reports `false` (already recorded). Exactly one quota debit is
    /// written per analysis_id.
    pub async fn record_upload(
        &self,
        analysis_id: Uuid,
        latency_ms: Option<i32>,
        raw_assessment: &serde_json::Value,
        progress: Option<&UploadProgressWrite>,
        debit_teacher_id: Option<i32>,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO assessment_attempts
                (student_item_progress_id, analysis_id, latency_ms, raw_assessment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (analysis_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(progress.map(|p| p.progress_id))
        .bind(analysis_id)
        .bind(latency_ms)
        .bind(raw_assessment)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            // Retried upload; the first write already happened.
            tx.commit().await?;
            return Ok(false);
        }

        if let Some(p) = progress {
            match p.scores {
                Some(scores) => {
                    sqlx::query(
                        r#"
                        UPDATE student_item_progress
                        SET recording_url = $2,
                            transcription = $3,
                            accuracy_score = $4,
                            fluency_score = $5,
                            pronunciation_score = $6,
                            completeness_score = $7,
                            raw_assessment = $8,
                            last_assessed_at = NOW(),
                            updated_at = NOW()
                        WHERE id = $1
                        "#,
                    )
                    .bind(p.progress_id)
                    .bind(&p.recording_url)
                    .bind(p.transcription.as_deref())
                    .bind(scores.accuracy)
                    .bind(scores.fluency)
                    .bind(scores.pronunciation)
                    .bind(scores.completeness)
                    .bind(raw_assessment)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    // Unparseable score blob: keep the recording, leave all
                    // four dimensions null.
                    sqlx::query(
                        r#"
                        UPDATE student_item_progress
                        SET recording_url = $2, updated_at = NOW()
                        WHERE id = $1
                        "#,
                    )
                    .bind(p.progress_id)
                    .bind(&p.recording_url)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        if let Some(teacher_id) = debit_teacher_id {
            sqlx::query(
                r#"
                INSERT INTO quota_ledger (teacher_id, reason, analysis_id, delta)
                VALUES ($1, 'speech_assessment', $2, -1)
                ON CONFLICT (analysis_id) DO NOTHING
                "#,
            )
            .bind(teacher_id)
            .bind(analysis_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Atomically bump the daily credential counter and return the new
    /// value. Concurrent callers serialize on the row.
    pub async fn increment_credential_quota(
        &self,
        principal_key: &str,
        quota_date: NaiveDate,
    ) -> AppResult<i64> {
        let (used,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO credential_quota (principal_key, quota_date, used)
            VALUES ($1, $2, 1)
            ON CONFLICT (principal_key, quota_date)
            DO UPDATE SET used = credential_quota.used + 1
            RETURNING used
            "#,
        )
        .bind(principal_key)
        .bind(quota_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(used as i64)
    }
}
