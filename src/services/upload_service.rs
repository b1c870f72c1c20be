use uuid::Uuid;

use crate::api::middleware::auth::AuthUser;
use crate::integrations::audio_store::AudioStore;
use crate::integrations::azure_speech;
use crate::repositories::assessment_repo::{AssessmentRepository, UploadProgressWrite};
use crate::repositories::classroom_repo::ClassroomRepository;
use crate::repositories::progress_repo::ProgressRepository;
use crate::repositories::student_repo::StudentRepository;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// False when the analysis_id had already been recorded and this call
    /// changed nothing.
    pub persisted: bool,
    pub recording_url: Option<String>,
}

pub struct UploadService {
    assessment_repo: AssessmentRepository,
    progress_repo: ProgressRepository,
    student_repo: StudentRepository,
    classroom_repo: ClassroomRepository,
    audio_store: AudioStore,
}

impl UploadService {
    pub fn new(
        assessment_repo: AssessmentRepository,
        progress_repo: ProgressRepository,
        student_repo: StudentRepository,
        classroom_repo: ClassroomRepository,
        audio_store: AudioStore,
    ) -> Self {
        Self {
            assessment_repo,
            progress_repo,
            student_repo,
            classroom_repo,
            audio_store,
        }
    }

    /// Persist a browser-side assessment. Retries with the same
    /// analysis_id succeed without re-persisting or re-debiting; teacher
    /// principals are preview-only and skip persistence entirely.
    pub async fn upload_analysis(
        &self,
        principal: &AuthUser,
        audio: Vec<u8>,
        analysis_json: serde_json::Value,
        latency_ms: Option<i32>,
        analysis_id: Uuid,
        progress_id: Option<i32>,
    ) -> AppResult<UploadOutcome> {
        if principal.role == "teacher" {
            return Ok(UploadOutcome {
                persisted: false,
                recording_url: None,
            });
        }

        if principal.role != "student" {
            return Err(AppError::Forbidden(
                "only students and teachers may upload assessments".to_string(),
            ));
        }

        let recording_url = self.audio_store.save(analysis_id, &audio).await?;

        // A malformed blob still persists the attempt; the item keeps its
        // recording and stays unscored.
        let parsed = azure_speech::parse_assessment(&analysis_json);

        let progress = match progress_id {
            Some(progress_id) => {
                let (student_id, _) = self
                    .progress_repo
                    .find_item_owner(progress_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Progress row not found".to_string()))?;

                if student_id != principal.id {
                    return Err(AppError::Forbidden(
                        "progress row belongs to another student".to_string(),
                    ));
                }

                Some(UploadProgressWrite {
                    progress_id,
                    recording_url: recording_url.clone(),
                    scores: parsed.as_ref().map(|p| p.scores),
                    transcription: parsed
                        .as_ref()
                        .map(|p| p.recognized_text.clone())
                        .filter(|t| !t.is_empty()),
                })
            }
            None => None,
        };

        let debit_teacher_id = self.resolve_debit_teacher(principal.id, progress_id).await?;

        let persisted = self
            .assessment_repo
            .record_upload(
                analysis_id,
                latency_ms,
                &analysis_json,
                progress.as_ref(),
                debit_teacher_id,
            )
            .await?;

        Ok(UploadOutcome {
            persisted,
            recording_url: Some(recording_url),
        })
    }

    /// Point deduction lands on the classroom's owning teacher.
    async fn resolve_debit_teacher(
        &self,
        student_id: i32,
        progress_id: Option<i32>,
    ) -> AppResult<Option<i32>> {
        if let Some(progress_id) = progress_id {
            if let Some((_, teacher_id)) = self.progress_repo.find_item_owner(progress_id).await? {
                return Ok(Some(teacher_id));
            }
        }

        let Some(student) = self.student_repo.find_by_id(student_id).await? else {
            return Ok(None);
        };
        let classroom = self.classroom_repo.find_by_id(student.classroom_id).await?;

        Ok(classroom.map(|c| c.teacher_id))
    }
}
