mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use common::{app, body_json, json_request, token};
use iqac_portal::{
    middleware::{issue_token, Claims},
    models::{Role, SubRole, User},
};
use tower::ServiceExt;

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let response = app()
        .await
        .oneshot(json_request("GET", "/api/tasks", None, ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Missing bearer token");
}

#[tokio::test]
async fn malformed_token_is_unauthorized() {
    let response = app()
        .await
        .oneshot(json_request("GET", "/api/notifications", Some("not.a.jwt"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_from_another_secret_is_unauthorized() {
    let user = User::new("Eve".into(), "eve@x.org", "h".into(), Role::Admin, None, None);
    let forged = issue_token(&Claims::for_user(&user, 1).unwrap(), "someone-else").unwrap();

    let response = app()
        .await
        .oneshot(json_request("GET", "/api/assignments", Some(&forged), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_requires_credentials() {
    let response = app()
        .await
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            r#"{"email":"  ","password":""}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_admins_register_users() {
    let body = r#"{"name":"Kiran","email":"kiran@college.edu","password":"secret1","role":"user","subrole":"initiator"}"#;
    let reviewer = token(Role::User, Some(SubRole::Reviewer));

    let response = app()
        .await
        .oneshot(json_request("POST", "/api/auth/register", Some(&reviewer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn registration_validates_before_touching_storage() {
    let admin = token(Role::Admin, None);
    let body = r#"{"name":"Kiran","email":"kiran@college.edu","password":"123","role":"user"}"#;

    let response = app()
        .await
        .oneshot(json_request("POST", "/api/auth/register", Some(&admin), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("at least 6"));
}

#[tokio::test]
async fn viewers_cannot_assign_tasks() {
    let viewer = token(Role::Viewer, None);
    let body = r#"{
        "course_id": "65f3c1a2b4d5e6f708192a3b",
        "doc_type": "syllabus",
        "initiator_id": "65f3c1a2b4d5e6f708192a3c",
        "reviewer_id": "65f3c1a2b4d5e6f708192a3d",
        "deadline": "2099-01-01T00:00:00Z"
    }"#;

    let response = app()
        .await
        .oneshot(json_request("POST", "/api/assignments", Some(&viewer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn past_deadline_is_rejected() {
    let admin = token(Role::Admin, None);
    let body = r#"{
        "course_id": "65f3c1a2b4d5e6f708192a3b",
        "doc_type": "syllabus",
        "initiator_id": "65f3c1a2b4d5e6f708192a3c",
        "reviewer_id": "65f3c1a2b4d5e6f708192a3d",
        "deadline": "2001-01-01T00:00:00Z"
    }"#;

    let response = app()
        .await
        .oneshot(json_request("POST", "/api/assignments", Some(&admin), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_task_id_is_a_bad_request() {
    let admin = token(Role::Admin, None);

    let response = app()
        .await
        .oneshot(json_request("GET", "/api/tasks/not-an-id", Some(&admin), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn viewers_cannot_upload_files() {
    let viewer = token(Role::Viewer, None);
    let boundary = "XBOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/files/upload")
        .header("authorization", format!("Bearer {}", viewer))
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();

    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_yourself_is_refused() {
    let user = User::new("Root".into(), "root@college.edu", "h".into(), Role::Admin, None, None);
    let claims = Claims::for_user(&user, 1).unwrap();
    let admin = issue_token(&claims, common::SECRET).unwrap();
    let uri = format!("/api/auth/users/{}", claims.sub);

    let response = app()
        .await
        .oneshot(json_request("DELETE", &uri, Some(&admin), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
