mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

struct GradingFixture {
    assignment_id: i32,
    student_x: i32,
    student_y: i32,
}

/// Two students, one content with three items. X records everything, Y
/// records item 2 only.
async fn mixed_fixture(
    state: &duotopia_backend::AppState,
    router: &mut axum::Router,
    teacher_email: &str,
    texts: &[&str],
) -> (GradingFixture, String) {
    let (teacher_id, token) = register_and_login_teacher(router, teacher_email, "Grader").await;
    let classroom_id = create_classroom(&state.db, teacher_id, "Grading Class").await;
    let student_x = create_student(&state.db, classroom_id, "學生X").await;
    let student_y = create_student(&state.db, classroom_id, "學生Y").await;
    let content_id = create_content_with_items(&state.db, texts).await;
    let assignment_id =
        create_issued_assignment(&state.db, teacher_id, classroom_id, content_id).await;

    let sa_x = student_assignment_id(&state.db, student_x, assignment_id).await;
    for item in item_progress_ids(&state.db, sa_x).await {
        attach_recording(state, item).await;
    }

    let sa_y = student_assignment_id(&state.db, student_y, assignment_id).await;
    let y_items = item_progress_ids(&state.db, sa_y).await;
    attach_recording(state, y_items[1]).await;

    (
        GradingFixture {
            assignment_id,
            student_x,
            student_y,
        },
        token,
    )
}

fn result_for<'a>(
    results: &'a [serde_json::Value],
    student_id: i32,
) -> &'a serde_json::Value {
    results
        .iter()
        .find(|r| r["student_id"] == student_id)
        .expect("student missing from response")
}

#[tokio::test]
async fn test_batch_grade_mixed_set() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (fixture, token) = mixed_fixture(
        &state,
        &mut router,
        "grader1@test.com",
        &["Sentence one.", "Sentence two.", "Sentence three."],
    )
    .await;

    let (status, body) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let results: Vec<serde_json::Value> = parse_json_response(&body);
    assert_eq!(results.len(), 2);

    // Provider returns {pron 92, acc 88, flu 85, comp 90} for every call.
    let x = result_for(&results, fixture.student_x);
    assert_eq!(x["status"], "graded");
    assert_eq!(x["total_items"], 3);
    assert_eq!(x["completed_items"], 3);
    assert_eq!(x["missing_items"], 0);
    assert_eq!(x["avg_pronunciation"], 92.0);
    assert_eq!(x["avg_accuracy"], 88.0);
    assert_eq!(x["total_score"], 88.75);

    let y = result_for(&results, fixture.student_y);
    assert_eq!(y["total_items"], 3);
    assert_eq!(y["completed_items"], 1);
    assert_eq!(y["missing_items"], 2);
    // Single-item mean per dimension.
    assert_eq!(y["avg_pronunciation"], 92.0);
    assert_eq!(y["total_score"], 88.75);
    assert!(
        y["feedback"].as_str().unwrap().starts_with("完成了 1/3 題"),
        "feedback was: {}",
        y["feedback"]
    );

    // Per-item persistence: scores, feedback, timestamp, attempt rows.
    let (scored,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM student_item_progress sip
         JOIN student_assignments sa ON sa.id = sip.student_assignment_id
         WHERE sa.assignment_id = $1 AND sip.accuracy_score IS NOT NULL
           AND sip.last_assessed_at IS NOT NULL AND sip.item_feedback IS NOT NULL",
    )
    .bind(fixture.assignment_id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(scored, 4);

    let (attempts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assessment_attempts")
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(attempts, 4);

    // The assignment graph materialized one content with three items and
    // per-content progress rows for each student.
    let assignment_repo =
        duotopia_backend::repositories::assignment_repo::AssignmentRepository::new(state.db.clone());
    let contents = assignment_repo
        .list_contents(fixture.assignment_id)
        .await
        .unwrap();
    assert_eq!(contents.len(), 1);
    let content_items = assignment_repo
        .list_content_items(contents[0].id)
        .await
        .unwrap();
    assert_eq!(content_items.len(), 3);

    let progress_repo =
        duotopia_backend::repositories::progress_repo::ProgressRepository::new(state.db.clone());
    let sa_x = student_assignment_id(&state.db, fixture.student_x, fixture.assignment_id).await;

    let content_progress: Vec<duotopia_backend::models::progress::StudentContentProgress> =
        sqlx::query_as("SELECT * FROM student_content_progress WHERE student_assignment_id = $1")
            .bind(sa_x)
            .fetch_all(&state.db)
            .await
            .unwrap();
    assert_eq!(content_progress.len(), 1);
    assert_eq!(content_progress[0].content_id, contents[0].id);

    let sa = progress_repo
        .find_student_assignment(sa_x)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sa.status, "GRADED");
    assert!(sa.feedback.unwrap().starts_with("完成了 3/3 題"));

    let (graded,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM student_assignments
         WHERE assignment_id = $1 AND status = 'GRADED' AND feedback IS NOT NULL",
    )
    .bind(fixture.assignment_id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(graded, 2);
}

#[tokio::test]
async fn test_batch_grade_partial_provider_failure() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    // Item 2's reference text trips the scripted provider failure.
    let (fixture, token) = mixed_fixture(
        &state,
        &mut router,
        "grader2@test.com",
        &["Sentence one.", "[provider-fail] Sentence two.", "Sentence three."],
    )
    .await;

    let (status, body) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&token),
    )
    .await;

    // Provider failures never fail the request.
    assert_eq!(status, StatusCode::OK, "{}", body);
    let results: Vec<serde_json::Value> = parse_json_response(&body);

    let x = result_for(&results, fixture.student_x);
    // Completion measures audio, not scoring.
    assert_eq!(x["completed_items"], 3);
    assert_eq!(x["total_items"], 3);
    assert_eq!(x["missing_items"], 1);
    // Averages are over the two scored items; dimensions are uniform so
    // the means are unchanged.
    assert_eq!(x["avg_pronunciation"], 92.0);
    assert_eq!(x["total_score"], 88.75);
    assert_eq!(x["status"], "graded");

    // The failed item stays unscored with no feedback.
    let sa_x = student_assignment_id(&state.db, fixture.student_x, fixture.assignment_id).await;
    let items = item_progress_ids(&state.db, sa_x).await;
    let progress_repo =
        duotopia_backend::repositories::progress_repo::ProgressRepository::new(state.db.clone());
    let failed_item = progress_repo
        .find_item_by_id(items[1])
        .await
        .unwrap()
        .unwrap();
    assert!(!failed_item.has_scores());
    assert!(failed_item.item_feedback.is_none());
    assert!(failed_item.last_assessed_at.is_none());
    // Still eligible for a later run.
    assert!(failed_item.is_eligible_for_assessment());
}

#[tokio::test]
async fn test_regrade_is_noop_at_provider() {
    let mock = Arc::new(MockSpeechProvider::new());
    let state = create_test_app_state_with(mock.clone()).await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (fixture, token) = mixed_fixture(
        &state,
        &mut router,
        "grader3@test.com",
        &["Alpha.", "Beta.", "Gamma."],
    )
    .await;

    let (status, first_body) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let calls_after_first = mock.calls();
    assert_eq!(calls_after_first, 4);

    // Every item now carries a last-assessment timestamp, so the second
    // run never reaches the provider and returns the same aggregates.
    let (status, second_body) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.calls(), calls_after_first);
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn test_batch_grade_requires_permission() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (fixture, _) = mixed_fixture(
        &state,
        &mut router,
        "grader4@test.com",
        &["One.", "Two.", "Three."],
    )
    .await;

    // A teacher with no relationship to the assignment gets a 403 before
    // any work happens.
    let (_, outsider_token) =
        register_and_login_teacher(&mut router, "outsider@test.com", "Outsider").await;

    let (status, _) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&outsider_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (attempts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assessment_attempts")
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(attempts, 0);

    // Students cannot call the endpoint at all.
    let (teacher_id,): (i32,) =
        sqlx::query_as("SELECT teacher_id FROM assignments WHERE id = $1")
            .bind(fixture.assignment_id)
            .fetch_one(&state.db)
            .await
            .unwrap();
    let classroom_id = create_classroom(&state.db, teacher_id, "Other Class").await;
    create_student(&state.db, classroom_id, "路人").await;
    let student_token = login_student(&mut router, classroom_id, "路人").await;

    let (status, _) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&student_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_org_admin_can_grade_via_school_link() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (fixture, owner_token) = mixed_fixture(
        &state,
        &mut router,
        "grader5@test.com",
        &["Uno.", "Dos.", "Tres."],
    )
    .await;

    // Build the hierarchy: org -> school -> classroom link.
    let body = json!({ "name": "grading-org" });
    let (_, org_body) =
        make_json_request(&mut router, "POST", "/organizations", Some(body), Some(&owner_token))
            .await;
    let org: serde_json::Value = parse_json_response(&org_body);
    let org_id = org["id"].as_i64().unwrap();

    let body = json!({ "organization_id": org_id, "name": "Grading School" });
    let (_, school_body) =
        make_json_request(&mut router, "POST", "/schools", Some(body), Some(&owner_token)).await;
    let school: serde_json::Value = parse_json_response(&school_body);
    let school_id = school["id"].as_i64().unwrap();

    let (classroom_id,): (i32,) =
        sqlx::query_as("SELECT classroom_id FROM assignments WHERE id = $1")
            .bind(fixture.assignment_id)
            .fetch_one(&state.db)
            .await
            .unwrap();
    let body = json!({ "school_id": school_id });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/classrooms/{}/school", classroom_id),
        Some(body),
        Some(&owner_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // An org_admin of the parent organization can grade through the
    // school-domain inheritance, holding no school role at all.
    let (admin_id, admin_token) =
        register_and_login_teacher(&mut router, "orgadmin@test.com", "Org Admin").await;
    let body = json!({ "teacher_id": admin_id, "role": "org_admin" });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/organizations/{}/teachers", org_id),
        Some(body),
        Some(&owner_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", fixture.assignment_id),
        None,
        Some(&admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_batch_grade_missing_assignment() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (_, token) = register_and_login_teacher(&mut router, "grader6@test.com", "Grader").await;

    let (status, _) = make_json_request::<()>(
        &mut router,
        "POST",
        "/assignments/999999/batch-grade",
        None,
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_grade_zero_completion_feedback() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    // No recordings at all for either student.
    let (teacher_id, token) =
        register_and_login_teacher(&mut router, "grader7@test.com", "Grader").await;
    let classroom_id = create_classroom(&state.db, teacher_id, "Silent Class").await;
    let student_id = create_student(&state.db, classroom_id, "沉默生").await;
    let content_id = create_content_with_items(&state.db, &["One.", "Two.", "Three."]).await;
    let assignment_id =
        create_issued_assignment(&state.db, teacher_id, classroom_id, content_id).await;

    let (status, body) = make_json_request::<()>(
        &mut router,
        "POST",
        &format!("/assignments/{}/batch-grade", assignment_id),
        None,
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results: Vec<serde_json::Value> = parse_json_response(&body);
    let r = result_for(&results, student_id);
    assert_eq!(r["completed_items"], 0);
    assert_eq!(r["total_score"], 0.0);
    let feedback = r["feedback"].as_str().unwrap();
    assert!(feedback.starts_with("完成了 0/3 題"), "feedback: {}", feedback);
    // No dimension detail clauses when nothing was recorded.
    assert!(!feedback.contains("整體表現"));
}
