//! End-to-end flows against a real database. Run with
//! `DATABASE_URL=... cargo test -- --ignored`.

mod common;

use axum::Router;
use axum::http::{StatusCode, header};
use common::{
    app, body_json, body_text, create_test_school, create_test_user, request, test_state,
    token_for,
};
use schoolhub::state::AppState;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

struct Fixture {
    app: Router,
    state: AppState,
    school_id: Uuid,
    admin_id: Uuid,
    admin_token: String,
}

async fn fixture(pool: PgPool) -> Fixture {
    let mut tx = pool.begin().await.unwrap();
    let school_id = create_test_school(&mut tx).await;
    let admin = create_test_user(&mut tx, "admin", Some(school_id)).await;
    tx.commit().await.unwrap();

    let state = test_state(pool);
    let admin_token = token_for(&state, admin.id, "admin", Some(school_id));
    Fixture {
        app: app(state.clone()),
        state,
        school_id,
        admin_id: admin.id,
        admin_token,
    }
}

impl Fixture {
    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request(method, uri, Some(&self.admin_token), body))
            .await
            .unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }

    async fn create_student(&self, number: &str) -> Uuid {
        let body = self.create_student_with_email(number, &common::unique_email()).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn create_student_with_email(&self, number: &str, email: &str) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/students",
                Some(json!({
                    "first_name": "Test",
                    "last_name": number,
                    "email": email,
                    "password": "Passw0rd!123",
                    "student_number": number,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn create_course(&self, code: &str, capacity: i32) -> Uuid {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/courses",
                Some(json!({
                    "code": code,
                    "name": "Data Structures",
                    "credit_hours": 3,
                    "max_capacity": capacity,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["code"], code.to_uppercase());
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn enroll(&self, student_id: Uuid, course_id: Uuid) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/v1/enrollments",
            Some(json!({ "student_id": student_id, "course_id": course_id })),
        )
        .await
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_enrollment_respects_capacity_and_duplicates(pool: PgPool) {
    let fx = fixture(pool).await;
    let course = fx.create_course("cs201", 1).await;
    let first = fx.create_student("S-100").await;
    let second = fx.create_student("S-101").await;

    let (status, body) = fx.enroll(first, course).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "active");

    let (status, _) = fx.enroll(first, course).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fx.enroll(second, course).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("full"), "{body}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_grades_complete_enrollment_and_feed_transcript(pool: PgPool) {
    let fx = fixture(pool).await;
    let course = fx.create_course("ds300", 2).await;
    let student = fx.create_student("S-200").await;

    let (_, enrollment) = fx.enroll(student, course).await;
    let enrollment_id = enrollment["id"].as_str().unwrap().to_string();

    for (title, score) in [("Midterm", 80.0), ("Final", 90.0)] {
        let (status, body) = fx
            .call(
                "POST",
                "/api/v1/grades",
                Some(json!({
                    "enrollment_id": enrollment_id,
                    "grade_type": "exam",
                    "title": title,
                    "score": score,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, _) = fx
        .call(
            "POST",
            "/api/v1/grades",
            Some(json!({
                "enrollment_id": enrollment_id,
                "grade_type": "quiz",
                "title": "Out of range",
                "score": 150.0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, completed) = fx
        .call(
            "POST",
            &format!("/api/v1/enrollments/{enrollment_id}/complete"),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{completed}");
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["final_score"], 85.0);
    assert_eq!(completed["final_letter"], "B");

    let (status, gpa) = fx
        .call("GET", &format!("/api/v1/students/{student}/gpa"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gpa["gpa"], 3.0);
    assert_eq!(gpa["total_credits"], 3);

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/reports/students/{student}/transcript/export"),
            Some(&fx.admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let csv = body_text(response).await;
    assert!(csv.starts_with("semester_name,course_code"));
    assert!(csv.contains("DS300"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_other_school_records_are_invisible(pool: PgPool) {
    let fx = fixture(pool.clone()).await;
    let course = fx.create_course("bio110", 5).await;

    let mut tx = pool.begin().await.unwrap();
    let other_school = create_test_school(&mut tx).await;
    let other_admin = create_test_user(&mut tx, "admin", Some(other_school)).await;
    tx.commit().await.unwrap();
    assert_ne!(other_school, fx.school_id);

    let token = token_for(&fx.state, other_admin.id, "admin", Some(other_school));
    let response = fx
        .app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/courses/{course}"),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_school_setting_overrides_global_default(pool: PgPool) {
    let fx = fixture(pool.clone()).await;

    let mut tx = pool.begin().await.unwrap();
    let sysadmin = create_test_user(&mut tx, "system_admin", None).await;
    tx.commit().await.unwrap();
    let sys_token = token_for(&fx.state, sysadmin.id, "system_admin", None);

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/v1/settings/grading.pass_mark",
            Some(&sys_token),
            Some(json!({ "value": "50", "global": true })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = fx
        .call(
            "PUT",
            "/api/v1/settings/grading.pass_mark",
            Some(json!({ "value": "60" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, setting) = fx.call("GET", "/api/v1/settings/grading.pass_mark", None).await;
    assert_eq!(setting["value"], "60");

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "DELETE",
            "/api/v1/settings/grading.pass_mark",
            Some(&fx.admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, setting) = fx.call("GET", "/api/v1/settings/grading.pass_mark", None).await;
    assert_eq!(setting["value"], "50");
    assert!(setting["school_id"].is_null());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_duplicate_email_is_rejected_case_insensitively(pool: PgPool) {
    let fx = fixture(pool).await;
    let email = common::unique_email();
    fx.create_student_with_email("S-500", &email).await;

    let (status, body) = fx
        .call(
            "POST",
            "/api/v1/users",
            Some(json!({
                "first_name": "Second",
                "last_name": "Account",
                "email": email.to_uppercase(),
                "password": "Passw0rd!123",
                "role": "admin",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "Email already exists");

    let (status, body) = fx
        .call(
            "POST",
            "/api/v1/students",
            Some(json!({
                "first_name": "Third",
                "last_name": "Account",
                "email": email,
                "password": "Passw0rd!123",
                "student_number": "S-501",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn test_student_lists_own_and_attached_documents(pool: PgPool) {
    let fx = fixture(pool).await;
    let student = fx.create_student_with_email("S-600", &common::unique_email()).await;
    let student_id: Uuid = student["id"].as_str().unwrap().parse().unwrap();
    let student_user: Uuid = student["user_id"].as_str().unwrap().parse().unwrap();
    let other = fx.create_student("S-601").await;

    let documents = [
        ("attached.pdf", fx.admin_id, Some(student_id)),
        ("uploaded.pdf", student_user, Some(student_id)),
        ("other.pdf", fx.admin_id, Some(other)),
        ("staff.pdf", fx.admin_id, None),
    ];
    for (name, owner, attached_to) in documents {
        sqlx::query(
            r#"INSERT INTO documents
                 (school_id, owner_id, student_id, file_name, content_type, size_bytes, storage_key)
               VALUES ($1, $2, $3, $4, 'application/pdf', 10, $5)"#,
        )
        .bind(fx.school_id)
        .bind(owner)
        .bind(attached_to)
        .bind(name)
        .bind(format!("{}/{}", fx.school_id, Uuid::new_v4()))
        .execute(&fx.state.db)
        .await
        .unwrap();
    }

    let token = token_for(&fx.state, student_user, "student", Some(fx.school_id));
    let response = fx
        .app
        .clone()
        .oneshot(request("GET", "/api/v1/documents", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let mut names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["file_name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["attached.pdf", "uploaded.pdf"]);
    assert_eq!(body["meta"]["total"], 2);
}
