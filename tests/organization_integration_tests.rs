mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

async fn create_org(router: &mut axum::Router, token: &str, name: &str) -> i32 {
    let body = json!({ "name": name, "display_name": name });
    let (status, body) =
        make_json_request(router, "POST", "/organizations", Some(body), Some(token)).await;
    assert_eq!(status, StatusCode::CREATED, "create org failed: {}", body);
    let response: serde_json::Value = parse_json_response(&body);
    response["id"].as_i64().unwrap() as i32
}

async fn create_school(router: &mut axum::Router, token: &str, org_id: i32, name: &str) -> i32 {
    let body = json!({ "organization_id": org_id, "name": name });
    let (status, body) =
        make_json_request(router, "POST", "/schools", Some(body), Some(token)).await;
    assert_eq!(status, StatusCode::CREATED, "create school failed: {}", body);
    let response: serde_json::Value = parse_json_response(&body);
    response["id"].as_i64().unwrap() as i32
}

#[tokio::test]
async fn test_org_owner_uniqueness() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (_, t1) = register_and_login_teacher(&mut router, "owner1@test.com", "Owner 1").await;
    let (t2_id, _) = register_and_login_teacher(&mut router, "owner2@test.com", "Owner 2").await;

    let org = create_org(&mut router, &t1, "org-uniqueness").await;

    // A second org_owner violates the single-owner invariant.
    let body = json!({ "teacher_id": t2_id, "role": "org_owner" });
    let (status, body_text) = make_json_request(
        &mut router,
        "POST",
        &format!("/organizations/{}/teachers", org),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body_text);

    // org_admin is fine.
    let body = json!({ "teacher_id": t2_id, "role": "org_admin" });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/organizations/{}/teachers", org),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Unknown roles are rejected against the closed set.
    let body = json!({ "teacher_id": t2_id, "role": "superuser" });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/organizations/{}/teachers", org),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cross_org_isolation() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (_, t1) = register_and_login_teacher(&mut router, "iso1@test.com", "Iso 1").await;
    let (_, t2) = register_and_login_teacher(&mut router, "iso2@test.com", "Iso 2").await;

    let org_a = create_org(&mut router, &t1, "org-a").await;
    let org_b = create_org(&mut router, &t2, "org-b").await;
    let school_a = create_school(&mut router, &t1, org_a, "School A1").await;
    let school_b = create_school(&mut router, &t2, org_b, "School B1").await;

    // T1 sees exactly org A.
    let (status, body) =
        make_json_request::<()>(&mut router, "GET", "/organizations", None, Some(&t1)).await;
    assert_eq!(status, StatusCode::OK);
    let orgs: Vec<serde_json::Value> = parse_json_response(&body);
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0]["id"], org_a);

    // T1's school listing is restricted to org A's schools.
    let (status, body) =
        make_json_request::<()>(&mut router, "GET", "/schools", None, Some(&t1)).await;
    assert_eq!(status, StatusCode::OK);
    let schools: Vec<serde_json::Value> = parse_json_response(&body);
    assert_eq!(schools.len(), 1);
    assert_eq!(schools[0]["id"], school_a);

    // A direct probe at the other tenant's school is forbidden.
    let (status, _) = make_json_request::<()>(
        &mut router,
        "GET",
        &format!("/schools/{}", school_b),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_organization_round_trip() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (teacher_id, t1) = register_and_login_teacher(&mut router, "del@test.com", "Deleter").await;
    let org = create_org(&mut router, &t1, "org-to-delete").await;
    let school = create_school(&mut router, &t1, org, "Doomed School").await;

    // Link a classroom so the cascade has a link row to remove.
    let classroom_id = create_classroom(&state.db, teacher_id, "Class").await;
    let body = json!({ "school_id": school });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/classrooms/{}/school", classroom_id),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = make_json_request::<()>(
        &mut router,
        "DELETE",
        &format!("/organizations/{}", org),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Listing no longer includes it.
    let (_, body) =
        make_json_request::<()>(&mut router, "GET", "/organizations", None, Some(&t1)).await;
    let orgs: Vec<serde_json::Value> = parse_json_response(&body);
    assert!(orgs.is_empty());

    // The row survives with active=false; the cascade reached the school
    // and the classroom link.
    let (is_active,): (bool,) =
        sqlx::query_as("SELECT is_active FROM organizations WHERE id = $1")
            .bind(org)
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert!(!is_active);

    let (school_active,): (bool,) = sqlx::query_as("SELECT is_active FROM schools WHERE id = $1")
        .bind(school)
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert!(!school_active);

    let (links,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM classroom_schools WHERE classroom_id = $1")
            .bind(classroom_id)
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(links, 0);

    // Permission resolution excludes the inactive org.
    let (status, _) = make_json_request::<()>(
        &mut router,
        "GET",
        &format!("/schools/{}", school),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reactivation_restores_grants() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (_, t1) = register_and_login_teacher(&mut router, "react@test.com", "Reactor").await;
    let org = create_org(&mut router, &t1, "org-reactivate").await;
    let school = create_school(&mut router, &t1, org, "Phoenix School").await;

    make_json_request::<()>(
        &mut router,
        "DELETE",
        &format!("/organizations/{}", org),
        None,
        Some(&t1),
    )
    .await;

    // Re-activate through the stored-owner path.
    let body = json!({ "is_active": true });
    let (status, body_text) = make_json_request(
        &mut router,
        "PATCH",
        &format!("/organizations/{}", org),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body_text);

    // Grants are re-established from the stored role fields.
    let (status, _) = make_json_request::<()>(
        &mut router,
        "GET",
        &format!("/schools/{}", school),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) =
        make_json_request::<()>(&mut router, "GET", "/organizations", None, Some(&t1)).await;
    let orgs: Vec<serde_json::Value> = parse_json_response(&body);
    assert_eq!(orgs.len(), 1);
}

#[tokio::test]
async fn test_school_membership_union_and_revoke() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (_, t1) = register_and_login_teacher(&mut router, "m1@test.com", "Admin").await;
    let (t2_id, t2) = register_and_login_teacher(&mut router, "m2@test.com", "Member").await;

    let org = create_org(&mut router, &t1, "org-membership").await;
    let school = create_school(&mut router, &t1, org, "Member School").await;

    // Add with role teacher.
    let body = json!({ "teacher_id": t2_id, "roles": ["teacher"] });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/schools/{}/teachers", school),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // The member can now read the school.
    let (status, _) = make_json_request::<()>(
        &mut router,
        "GET",
        &format!("/schools/{}", school),
        None,
        Some(&t2),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Adding again with school_admin unions the role sets.
    let body = json!({ "teacher_id": t2_id, "roles": ["school_admin"] });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/schools/{}/teachers", school),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (roles,): (Vec<String>,) = sqlx::query_as(
        "SELECT roles FROM teacher_schools WHERE teacher_id = $1 AND school_id = $2",
    )
    .bind(t2_id)
    .bind(school)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(roles, vec!["school_admin", "teacher"]);

    // An empty or out-of-set role list is rejected.
    let body = json!({ "teacher_id": t2_id, "roles": ["org_owner"] });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/schools/{}/teachers", school),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Replacing the role set narrows it back down.
    let body = json!({ "roles": ["school_admin"] });
    let (status, _) = make_json_request(
        &mut router,
        "PATCH",
        &format!("/schools/{}/teachers/{}", school, t2_id),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (roles,): (Vec<String>,) = sqlx::query_as(
        "SELECT roles FROM teacher_schools WHERE teacher_id = $1 AND school_id = $2",
    )
    .bind(t2_id)
    .bind(school)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(roles, vec!["school_admin"]);

    // Removal revokes access.
    let (status, _) = make_json_request::<()>(
        &mut router,
        "DELETE",
        &format!("/schools/{}/teachers/{}", school, t2_id),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = make_json_request::<()>(
        &mut router,
        "GET",
        &format!("/schools/{}", school),
        None,
        Some(&t2),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_classroom_links_to_at_most_one_school() {
    let state = create_test_app_state().await;
    let mut router = create_test_router(state.clone());

    let _guard = cleanup_test_data(&state.db).await;

    let (teacher_id, t1) = register_and_login_teacher(&mut router, "link@test.com", "Linker").await;
    let org = create_org(&mut router, &t1, "org-links").await;
    let school_1 = create_school(&mut router, &t1, org, "First School").await;
    let school_2 = create_school(&mut router, &t1, org, "Second School").await;
    let classroom_id = create_classroom(&state.db, teacher_id, "Linked Class").await;

    let body = json!({ "school_id": school_1 });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/classrooms/{}/school", classroom_id),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Second link is a conflict until the first is removed.
    let body = json!({ "school_id": school_2 });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/classrooms/{}/school", classroom_id),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = make_json_request::<()>(
        &mut router,
        "DELETE",
        &format!("/classrooms/{}/school", classroom_id),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = json!({ "school_id": school_2 });
    let (status, _) = make_json_request(
        &mut router,
        "POST",
        &format!("/classrooms/{}/school", classroom_id),
        Some(body),
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // The school's classroom listing reflects the link.
    let (status, body) = make_json_request::<()>(
        &mut router,
        "GET",
        &format!("/schools/{}/classrooms", school_2),
        None,
        Some(&t1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let classrooms: Vec<serde_json::Value> = parse_json_response(&body);
    assert_eq!(classrooms.len(), 1);
    assert_eq!(classrooms[0]["id"], classroom_id);
}
