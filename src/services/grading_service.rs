use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Action, AuthzEngine, Domain, Resource};
use crate::integrations::audio_store::AudioStore;
use crate::integrations::azure_speech::{AssessmentResult, SpeechProvider};
use crate::repositories::assignment_repo::AssignmentRepository;
use crate::repositories::classroom_repo::ClassroomRepository;
use crate::repositories::progress_repo::{
    ItemForGrading, ItemGradeWrite, ProgressRepository, StudentAssignmentRow,
};
use crate::services::feedback;
use crate::utils::error::{AppError, AppResult};

/// Per-student outcome of a batch-grading run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentResult {
    #[schema(example = 12)]
    pub student_id: i32,
    #[schema(example = "王小明")]
    pub student_name: String,
    #[schema(example = 88.75)]
    pub total_score: f64,
    /// Items still unscored after the run.
    #[schema(example = 0)]
    pub missing_items: i64,
    #[schema(example = 3)]
    pub total_items: i64,
    /// Items with a recording; completion measures audio, not scoring.
    #[schema(example = 3)]
    pub completed_items: i64,
    #[schema(example = 92.0)]
    pub avg_pronunciation: f64,
    #[schema(example = 88.0)]
    pub avg_accuracy: f64,
    #[schema(example = 85.0)]
    pub avg_fluency: f64,
    #[schema(example = 90.0)]
    pub avg_completeness: f64,
    #[schema(example = "完成了 3/3 題，整體表現良好，請繼續保持。")]
    pub feedback: Option<String>,
    /// "graded" or "error".
    #[schema(example = "graded")]
    pub status: String,
}

/// Everything a per-student grading task needs, clonable into the task.
#[derive(Clone)]
struct GradeContext {
    pool: PgPool,
    provider: Arc<dyn SpeechProvider>,
    audio_store: AudioStore,
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
    item_timeout: Duration,
}

pub struct GradingService {
    ctx: GradeContext,
    authz: Arc<AuthzEngine>,
}

impl GradingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        authz: Arc<AuthzEngine>,
        provider: Arc<dyn SpeechProvider>,
        audio_store: AudioStore,
        http: reqwest::Client,
        worker_pool_size: usize,
        item_timeout: Duration,
    ) -> Self {
        Self {
            ctx: GradeContext {
                pool,
                provider,
                audio_store,
                http,
                semaphore: Arc::new(Semaphore::new(worker_pool_size.max(1))),
                item_timeout,
            },
            authz,
        }
    }

    /// Grade every eligible item of every student in the assignment.
    /// Authorization failure aborts before any work; everything after that
    /// degrades per item or per student, never the whole batch.
    pub async fn batch_grade_assignment(
        &self,
        caller: i32,
        assignment_id: i32,
    ) -> AppResult<Vec<StudentResult>> {
        let assignment_repo = AssignmentRepository::new(self.ctx.pool.clone());
        let classroom_repo = ClassroomRepository::new(self.ctx.pool.clone());
        let progress_repo = ProgressRepository::new(self.ctx.pool.clone());

        let assignment = assignment_repo
            .find_by_id(assignment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;

        // Gate before any work. The assignment's domain is the school its
        // classroom links to; an unlinked classroom falls back to direct
        // ownership.
        if assignment.teacher_id != caller {
            match classroom_repo.find_school_link(assignment.classroom_id).await? {
                Some(link) => self.authz.require(
                    caller,
                    Resource::Assignment,
                    Action::Update,
                    Domain::School(link.school_id),
                )?,
                None => {
                    return Err(AppError::Forbidden(
                        "not allowed to grade this assignment".to_string(),
                    ))
                }
            }
        }

        let students = progress_repo.list_for_assignment(assignment_id).await?;

        let mut results = Vec::with_capacity(students.len());
        for row in students {
            // Each student runs as its own task: a dropped request stops
            // dispatching further students while the in-flight one still
            // finishes and commits.
            let ctx = self.ctx.clone();
            let handle = tokio::spawn(grade_student(ctx, row.clone()));
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(
                        student_id = row.student_id,
                        "grading task failed: {}",
                        e
                    );
                    results.push(error_result(&row, None));
                }
            }
        }

        Ok(results)
    }
}

/// Grade one student: fan out the eligible items through the bounded
/// worker pool, then commit every write in a single transaction.
async fn grade_student(ctx: GradeContext, row: StudentAssignmentRow) -> StudentResult {
    let progress_repo = ProgressRepository::new(ctx.pool.clone());

    let items = match progress_repo.list_items_for_grading(row.id).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(student_id = row.student_id, "failed to load items: {}", e);
            return error_result(&row, None);
        }
    };

    let mut set = JoinSet::new();
    for item in items.iter().filter(|i| i.is_eligible()).cloned() {
        let ctx = ctx.clone();
        set.spawn(async move {
            let permit = ctx.semaphore.clone().acquire_owned().await;
            if permit.is_err() {
                return (item, Err(AppError::Internal("worker pool closed".to_string())));
            }
            let outcome = assess_item(&ctx, &item).await;
            (item, outcome)
        });
    }

    let mut writes: Vec<ItemGradeWrite> = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((item, Ok(result))) => {
                writes.push(ItemGradeWrite {
                    item_progress_id: item.id,
                    analysis_id: Uuid::new_v4(),
                    scores: result.scores,
                    transcription: Some(result.recognized_text)
                        .filter(|t| !t.is_empty()),
                    raw_assessment: result.raw,
                    item_feedback: feedback::item_feedback(&result.scores),
                });
            }
            Ok((item, Err(e))) => {
                // The item stays unscored; the batch carries on.
                tracing::warn!(
                    item_progress_id = item.id,
                    student_id = row.student_id,
                    "item assessment failed: {}",
                    e
                );
            }
            Err(e) => {
                tracing::error!(student_id = row.student_id, "item task panicked: {}", e);
            }
        }
    }

    // Provider calls complete in any order; commits are ordered.
    writes.sort_by_key(|w| w.item_progress_id);

    // Fold the fresh scores into the item view so aggregation sees the
    // post-commit state.
    let mut view = items;
    for write in &writes {
        if let Some(item) = view.iter_mut().find(|i| i.id == write.item_progress_id) {
            item.accuracy_score = Some(write.scores.accuracy);
            item.fluency_score = Some(write.scores.fluency);
            item.pronunciation_score = Some(write.scores.pronunciation);
            item.completeness_score = Some(write.scores.completeness);
            item.last_assessed_at = Some(chrono::Utc::now());
        }
    }

    let agg = feedback::aggregate(&view);
    let feedback_text = feedback::assignment_feedback(&agg);

    match progress_repo
        .commit_student_grades(row.id, &writes, &feedback_text)
        .await
    {
        Ok(()) => StudentResult {
            student_id: row.student_id,
            student_name: row.student_name.clone(),
            total_score: agg.total_score,
            missing_items: agg.missing_items,
            total_items: agg.total_items,
            completed_items: agg.completed_items,
            avg_pronunciation: agg.avg_pronunciation,
            avg_accuracy: agg.avg_accuracy,
            avg_fluency: agg.avg_fluency,
            avg_completeness: agg.avg_completeness,
            feedback: Some(feedback_text),
            status: "graded".to_string(),
        },
        Err(e) => {
            tracing::error!(
                student_id = row.student_id,
                "per-student commit failed: {}",
                e
            );
            // Nothing was persisted for this student; report the
            // pre-commit state.
            let rolled_back: Vec<ItemForGrading> = view
                .into_iter()
                .map(|mut item| {
                    if writes.iter().any(|w| w.item_progress_id == item.id) {
                        item.accuracy_score = None;
                        item.fluency_score = None;
                        item.pronunciation_score = None;
                        item.completeness_score = None;
                        item.last_assessed_at = None;
                    }
                    item
                })
                .collect();
            error_result(&row, Some(feedback::aggregate(&rolled_back)))
        }
    }
}

fn error_result(row: &StudentAssignmentRow, agg: Option<feedback::StudentAggregate>) -> StudentResult {
    let agg = agg.unwrap_or(feedback::StudentAggregate {
        total_items: 0,
        completed_items: 0,
        missing_items: 0,
        avg_accuracy: 0.0,
        avg_fluency: 0.0,
        avg_pronunciation: 0.0,
        avg_completeness: 0.0,
        total_score: 0.0,
    });

    StudentResult {
        student_id: row.student_id,
        student_name: row.student_name.clone(),
        total_score: agg.total_score,
        missing_items: agg.missing_items,
        total_items: agg.total_items,
        completed_items: agg.completed_items,
        avg_pronunciation: agg.avg_pronunciation,
        avg_accuracy: agg.avg_accuracy,
        avg_fluency: agg.avg_fluency,
        avg_completeness: agg.avg_completeness,
        feedback: None,
        status: "error".to_string(),
    }
}

/// Fetch the recording and run the provider assessment under the per-item
/// timeout. A timeout counts as failure; no partial writes happen.
async fn assess_item(ctx: &GradeContext, item: &ItemForGrading) -> AppResult<AssessmentResult> {
    let url = item
        .recording_url
        .as_deref()
        .ok_or_else(|| AppError::Internal("eligible item without recording".to_string()))?;

    let audio = fetch_audio(ctx, url).await?;

    tokio::time::timeout(ctx.item_timeout, ctx.provider.assess(&item.text, audio))
        .await
        .map_err(|_| AppError::Provider("assessment timed out".to_string()))?
}

/// Recordings uploaded through this server come back from the local
/// store; anything else is fetched over the shared HTTP pool.
async fn fetch_audio(ctx: &GradeContext, url: &str) -> AppResult<Vec<u8>> {
    if let Some(bytes) = ctx.audio_store.load_by_url(url).await? {
        return Ok(bytes);
    }

    let response = ctx
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Provider(format!("failed to fetch recording: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Provider(format!(
            "recording fetch returned {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Provider(format!("failed to read recording: {}", e)))?;

    Ok(bytes.to_vec())
}
