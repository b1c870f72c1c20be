use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::assessment::DimensionScores;
use crate::models::progress::{AssignmentStatus, StudentAssignment, StudentItemProgress};
use crate::utils::error::AppResult;

/// A student assignment joined with the student's display name.
#[derive(Debug, Clone, FromRow)]
pub struct StudentAssignmentRow {
    pub id: i32,
    pub student_id: i32,
    pub student_name: String,
    pub assignment_id: i32,
    pub status: String,
    pub feedback: Option<String>,
}

/// An item-progress row joined with its reference text, the unit of work
/// for batch grading.
#[derive(Debug, Clone, FromRow)]
pub struct ItemForGrading {
    pub id: i32,
    pub student_assignment_id: i32,
    pub content_item_id: i32,
    pub text: String,
    pub recording_url: Option<String>,
    pub accuracy_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub pronunciation_score: Option<f64>,
    pub completeness_score: Option<f64>,
    pub last_assessed_at: Option<DateTime<Utc>>,
}

impl ItemForGrading {
    /// Eligible for assessment: has a recording, never assessed.
    pub fn is_eligible(&self) -> bool {
        self.recording_url.is_some() && self.last_assessed_at.is_none()
    }
}

/// One item's outcome to be committed in the per-student transaction.
#[derive(Debug, Clone)]
pub struct ItemGradeWrite {
    pub item_progress_id: i32,
    pub analysis_id: Uuid,
    pub scores: DimensionScores,
    pub transcription: Option<String>,
    pub raw_assessment: serde_json::Value,
    pub item_feedback: String,
}

pub struct ProgressRepository {
    pool: PgPool,
}

impl ProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_item_by_id(&self, id: i32) -> AppResult<Option<StudentItemProgress>> {
        let item = sqlx::query_as::<_, StudentItemProgress>(
            r#"
            SELECT * FROM student_item_progress WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// (student_id, owning classroom teacher) for an item-progress row.
    pub async fn find_item_owner(&self, item_id: i32) -> AppResult<Option<(i32, i32)>> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT s.id, c.teacher_id
            FROM student_item_progress sip
            JOIN student_assignments sa ON sa.id = sip.student_assignment_id
            JOIN students s ON s.id = sa.student_id
            JOIN classrooms c ON c.id = s.classroom_id
            WHERE sip.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn find_student_assignment(
        &self,
        id: i32,
    ) -> AppResult<Option<StudentAssignment>> {
        let sa = sqlx::query_as::<_, StudentAssignment>(
            r#"
            SELECT * FROM student_assignments WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sa)
    }

    pub async fn list_for_assignment(
        &self,
        assignment_id: i32,
    ) -> AppResult<Vec<StudentAssignmentRow>> {
        let rows = sqlx::query_as::<_, StudentAssignmentRow>(
            r#"
            SELECT sa.id, sa.student_id, s.name AS student_name,
                   sa.assignment_id, sa.status, sa.feedback
            FROM student_assignments sa
            JOIN students s ON s.id = sa.student_id
            WHERE sa.assignment_id = $1
            ORDER BY sa.student_id
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_items_for_grading(
        &self,
        student_assignment_id: i32,
    ) -> AppResult<Vec<ItemForGrading>> {
        let items = sqlx::query_as::<_, ItemForGrading>(
            r#"
            SELECT sip.id, sip.student_assignment_id, sip.content_item_id,
                   ci.text, sip.recording_url,
                   sip.accuracy_score, sip.fluency_score,
                   sip.pronunciation_score, sip.completeness_score,
                   sip.last_assessed_at
            FROM student_item_progress sip
            JOIN content_items ci ON ci.id = sip.content_item_id
            WHERE sip.student_assignment_id = $1
            ORDER BY sip.id
            "#,
        )
        .bind(student_assignment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Commit one student's batch-grading results atomically: every item
    /// score write, its assessment-attempt row, the aggregate feedback and
    /// the GRADED status flip happen in one transaction.
    pub async fn commit_student_grades(
        &self,
        student_assignment_id: i32,
        writes: &[ItemGradeWrite],
        feedback: &str,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for write in writes {
            sqlx::query(
                r#"
                UPDATE student_item_progress
                SET accuracy_score = $2,
                    fluency_score = $3,
                    pronunciation_score = $4,
                    completeness_score = $5,
                    transcription = $6,
                    raw_assessment = $7,
                    item_feedback = $8,
                    last_assessed_at = NOW(),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(write.item_progress_id)
            .bind(write.scores.accuracy)
            .bind(write.scores.fluency)
            .bind(write.scores.pronunciation)
            .bind(write.scores.completeness)
            .bind(write.transcription.as_deref())
            .bind(&write.raw_assessment)
            .bind(&write.item_feedback)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO assessment_attempts
                    (student_item_progress_id, analysis_id, raw_assessment)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(write.item_progress_id)
            .bind(write.analysis_id)
            .bind(&write.raw_assessment)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE student_assignments
            SET feedback = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(student_assignment_id)
        .bind(feedback)
        .bind(AssignmentStatus::Graded.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
