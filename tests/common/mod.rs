#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use duotopia_backend::authz::{AuthzEngine, PolicyTable};
use duotopia_backend::integrations::audio_store::AudioStore;
use duotopia_backend::integrations::azure_speech::{
    AssessmentResult, SpeechProvider,
};
use duotopia_backend::models::assessment::DimensionScores;
use duotopia_backend::services::token_service::IssuerState;
use duotopia_backend::utils::error::{AppError, AppResult};
use duotopia_backend::utils::password;
use duotopia_backend::{api, AppState, Config};

/// Scripted provider: fixed scores, failure injection via a text marker,
/// and a call counter for no-op assertions.
pub struct MockSpeechProvider {
    pub scores: DimensionScores,
    pub assess_calls: AtomicUsize,
}

impl MockSpeechProvider {
    pub fn new() -> Self {
        Self {
            // The fixture scores used across the grading suites.
            scores: DimensionScores {
                accuracy: 88.0,
                fluency: 85.0,
                pronunciation: 92.0,
                completeness: 90.0,
            },
            assess_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.assess_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    fn region(&self) -> &str {
        "test"
    }

    async fn issue_token(&self) -> AppResult<String> {
        Ok("test-provider-token".to_string())
    }

    async fn assess(&self, reference_text: &str, _audio: Vec<u8>) -> AppResult<AssessmentResult> {
        self.assess_calls.fetch_add(1, Ordering::SeqCst);

        if reference_text.contains("[provider-fail]") {
            return Err(AppError::Provider("injected provider failure".to_string()));
        }

        Ok(AssessmentResult {
            scores: self.scores,
            recognized_text: reference_text.to_string(),
            raw: json!({
                "NBest": [{
                    "Display": reference_text,
                    "PronunciationAssessment": {
                        "AccuracyScore": self.scores.accuracy,
                        "FluencyScore": self.scores.fluency,
                        "PronScore": self.scores.pronunciation,
                        "CompletenessScore": self.scores.completeness,
                    }
                }]
            }),
        })
    }
}

pub fn test_config() -> Config {
    Config {
        port: 3000,
        host: "127.0.0.1".to_string(),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/duotopia_test".to_string()),
        jwt_secret: "test-secret-key-for-testing-only".to_string(),
        jwt_expiration_hours: 24,
        azure_speech_key: "test-key".to_string(),
        azure_speech_region: "test".to_string(),
        speech_token_ttl_secs: 600,
        demo_daily_token_quota: 3,
        auth_daily_token_quota: None,
        grading_worker_pool_size: 8,
        grading_item_timeout_secs: 5,
        audio_storage_dir: std::env::temp_dir()
            .join("duotopia-test-audio")
            .to_string_lossy()
            .to_string(),
        audio_public_base_url: "http://localhost:3000/audio".to_string(),
        allowed_origins: vec!["http://localhost:5173".to_string()],
    }
}

/// Test helper to create app state with the given provider.
pub async fn create_test_app_state_with(provider: Arc<dyn SpeechProvider>) -> AppState {
    let config = test_config();

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let authz = Arc::new(AuthzEngine::new(
        PolicyTable::compile().expect("policy must compile"),
    ));
    authz.load(&pool).await.expect("authz snapshot load");

    let audio_store = AudioStore::new(
        config.audio_storage_dir.clone(),
        config.audio_public_base_url.clone(),
    );

    AppState {
        db: pool,
        config,
        authz,
        provider,
        audio_store,
        http: reqwest::Client::new(),
        issuer: Arc::new(IssuerState::new()),
    }
}

pub async fn create_test_app_state() -> AppState {
    create_test_app_state_with(Arc::new(MockSpeechProvider::new())).await
}

pub fn create_test_router(state: AppState) -> Router {
    api::routes(state)
}

/// Test helper to make JSON request
pub async fn make_json_request<T: Serialize>(
    router: &mut Router,
    method: &str,
    uri: &str,
    body: Option<T>,
    token: Option<&str>,
) -> (StatusCode, String) {
    let mut request_builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(token) = token {
        request_builder = request_builder.header("authorization", format!("Bearer {}", token));
    }

    let request = if let Some(body) = body {
        let json = serde_json::to_string(&body).unwrap();
        request_builder.body(Body::from(json)).unwrap()
    } else {
        request_builder.body(Body::empty()).unwrap()
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_string = String::from_utf8(body_bytes.to_vec()).unwrap();

    (status, body_string)
}

/// Like `make_json_request`, with extra headers (e.g. X-Forwarded-For).
pub async fn make_json_request_with_headers(
    router: &mut Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    token: Option<&str>,
) -> (StatusCode, String) {
    let mut request_builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    for (name, value) in headers {
        request_builder = request_builder.header(*name, *value);
    }
    if let Some(token) = token {
        request_builder = request_builder.header("authorization", format!("Bearer {}", token));
    }

    let response = router
        .clone()
        .oneshot(request_builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

pub fn parse_json_response<T: DeserializeOwned>(body: &str) -> T {
    serde_json::from_str(body).expect("Failed to parse JSON response")
}

/// Register a teacher and return (teacher_id, access_token).
pub async fn register_and_login_teacher(
    router: &mut Router,
    email: &str,
    name: &str,
) -> (i32, String) {
    let body = json!({
        "email": email,
        "password": "password123",
        "name": name,
    });
    let (status, response_body) =
        make_json_request(router, "POST", "/auth/register", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", response_body);
    let registered: serde_json::Value = parse_json_response(&response_body);
    let teacher_id = registered["id"].as_i64().unwrap() as i32;

    let body = json!({
        "email": email,
        "password": "password123",
    });
    let (status, response_body) =
        make_json_request(router, "POST", "/auth/login", Some(body), None).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", response_body);
    let response: serde_json::Value = parse_json_response(&response_body);

    (
        teacher_id,
        response["access_token"].as_str().unwrap().to_string(),
    )
}

pub async fn login_student(router: &mut Router, classroom_id: i32, name: &str) -> String {
    let body = json!({
        "classroom_id": classroom_id,
        "name": name,
        "password": "student123",
    });
    let (status, response_body) =
        make_json_request(router, "POST", "/auth/student/login", Some(body), None).await;
    assert_eq!(status, StatusCode::OK, "student login failed: {}", response_body);
    let response: serde_json::Value = parse_json_response(&response_body);
    response["access_token"].as_str().unwrap().to_string()
}

/// Tests share one database; hold this guard for the duration of any test
/// that touches it.
static TEST_LOCK: once_cell::sync::Lazy<std::sync::Arc<tokio::sync::Mutex<()>>> =
    once_cell::sync::Lazy::new(|| std::sync::Arc::new(tokio::sync::Mutex::new(())));

/// Test helper to clean up test data. Returns the database guard; bind it
/// with `let _guard = ...` so it lives until the end of the test.
pub async fn cleanup_test_data(pool: &PgPool) -> tokio::sync::OwnedMutexGuard<()> {
    let guard = TEST_LOCK.clone().lock_owned().await;
    // Clean up in reverse order of dependencies
    sqlx::query("DELETE FROM quota_ledger").execute(pool).await.ok();
    sqlx::query("DELETE FROM assessment_attempts").execute(pool).await.ok();
    sqlx::query("DELETE FROM credential_quota").execute(pool).await.ok();
    sqlx::query("DELETE FROM student_item_progress").execute(pool).await.ok();
    sqlx::query("DELETE FROM student_content_progress").execute(pool).await.ok();
    sqlx::query("DELETE FROM student_assignments").execute(pool).await.ok();
    sqlx::query("DELETE FROM assignment_contents").execute(pool).await.ok();
    sqlx::query("DELETE FROM assignments").execute(pool).await.ok();
    sqlx::query("DELETE FROM content_items").execute(pool).await.ok();
    sqlx::query("DELETE FROM contents").execute(pool).await.ok();
    sqlx::query("DELETE FROM classroom_schools").execute(pool).await.ok();
    sqlx::query("DELETE FROM teacher_schools").execute(pool).await.ok();
    sqlx::query("DELETE FROM teacher_organizations").execute(pool).await.ok();
    sqlx::query("DELETE FROM schools").execute(pool).await.ok();
    sqlx::query("DELETE FROM organizations").execute(pool).await.ok();
    sqlx::query("DELETE FROM students").execute(pool).await.ok();
    sqlx::query("DELETE FROM classrooms").execute(pool).await.ok();
    sqlx::query("DELETE FROM teachers WHERE email LIKE '%@test.com'")
        .execute(pool)
        .await
        .ok();

    guard
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_classroom(pool: &PgPool, teacher_id: i32, name: &str) -> i32 {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO classrooms (teacher_id, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(teacher_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

pub async fn create_student(pool: &PgPool, classroom_id: i32, name: &str) -> i32 {
    let hash = password::hash_password("student123").unwrap();
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO students (classroom_id, name, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(classroom_id)
    .bind(name)
    .bind(hash)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

pub async fn create_content_with_items(pool: &PgPool, texts: &[&str]) -> i32 {
    let (content_id,): (i32,) = sqlx::query_as(
        "INSERT INTO contents (lesson_id, title) VALUES (1, 'Reading practice') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    for (index, text) in texts.iter().enumerate() {
        sqlx::query(
            "INSERT INTO content_items (content_id, order_index, text) VALUES ($1, $2, $3)",
        )
        .bind(content_id)
        .bind(index as i32)
        .bind(text)
        .execute(pool)
        .await
        .unwrap();
    }

    content_id
}

/// Create an assignment over one content and issue it to the classroom.
pub async fn create_issued_assignment(
    pool: &PgPool,
    teacher_id: i32,
    classroom_id: i32,
    content_id: i32,
) -> i32 {
    use duotopia_backend::repositories::assignment_repo::AssignmentRepository;

    let repo = AssignmentRepository::new(pool.clone());
    let assignment = repo
        .create_assignment(teacher_id, classroom_id, "Weekly reading", &[content_id])
        .await
        .unwrap();
    repo.issue_to_classroom(assignment.id).await.unwrap();
    assignment.id
}

pub async fn student_assignment_id(pool: &PgPool, student_id: i32, assignment_id: i32) -> i32 {
    let (id,): (i32,) = sqlx::query_as(
        "SELECT id FROM student_assignments WHERE student_id = $1 AND assignment_id = $2",
    )
    .bind(student_id)
    .bind(assignment_id)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

/// Item progress ids for a student assignment, in item order.
pub async fn item_progress_ids(pool: &PgPool, student_assignment_id: i32) -> Vec<i32> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        "SELECT id FROM student_item_progress WHERE student_assignment_id = $1 ORDER BY id",
    )
    .bind(student_assignment_id)
    .fetch_all(pool)
    .await
    .unwrap();
    rows.into_iter().map(|(id,)| id).collect()
}

/// Store a recording through the audio store and attach it to the item.
pub async fn attach_recording(state: &AppState, item_progress_id: i32) {
    let url = state
        .audio_store
        .save(Uuid::new_v4(), b"riff-wav-test-bytes")
        .await
        .unwrap();

    sqlx::query("UPDATE student_item_progress SET recording_url = $2 WHERE id = $1")
        .bind(item_progress_id)
        .bind(url)
        .execute(&state.db)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Multipart upload helper
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "duotopia-test-boundary";

pub fn upload_body(
    analysis_id: Uuid,
    progress_id: Option<i32>,
    analysis_json: &str,
) -> (String, Vec<u8>) {
    let mut body: Vec<u8> = Vec::new();

    let mut push_text = |name: &str, value: &str| {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    };

    push_text("analysis_json", analysis_json);
    push_text("latency_ms", "250");
    push_text("analysis_id", &analysis_id.to_string());
    if let Some(progress_id) = progress_id {
        push_text("progress_id", &progress_id.to_string());
    }

    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"audio_file\"; filename=\"recording.webm\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: audio/webm\r\n\r\n");
    body.extend_from_slice(b"fake-webm-recording-bytes");
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub async fn post_upload(
    router: &mut Router,
    token: &str,
    analysis_id: Uuid,
    progress_id: Option<i32>,
    analysis_json: &str,
) -> (StatusCode, String) {
    let (content_type, body) = upload_body(analysis_id, progress_id, analysis_json);

    let request = Request::builder()
        .method("POST")
        .uri("/speech/upload-analysis")
        .header("content-type", content_type)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

/// A provider-shaped score blob, as the browser would upload it.
pub fn provider_blob(acc: f64, flu: f64, pron: f64, comp: f64) -> String {
    json!({
        "RecognitionStatus": "Success",
        "DisplayText": "How are you today?",
        "NBest": [{
            "Display": "How are you today?",
            "PronunciationAssessment": {
                "AccuracyScore": acc,
                "FluencyScore": flu,
                "PronScore": pron,
                "CompletenessScore": comp,
            }
        }]
    })
    .to_string()
}
