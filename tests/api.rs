use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use project_dashboard::api::{self, AppState, LoginResponse};
use project_dashboard::dashboard::Dashboard;
use project_dashboard::models::Project;
use project_dashboard::session::SessionSigner;
use project_dashboard::view::{DashboardView, ProjectDetail, ViewKind};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let dashboard = Dashboard::with_default_accounts(4).unwrap();
    let signer = SessionSigner::new("api-test-secret", chrono::Duration::hours(1));
    api::router(Arc::new(AppState::new(dashboard, signer)))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    parse::<LoginResponse>(&body).token
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "admin1", "password": "wrong" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = parse(&body);
    assert_eq!(body["error"], "invalid username or password");
}

#[tokio::test]
async fn dashboard_requires_a_token() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/dashboard", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_project_lifecycle_over_http() {
    let app = app();
    let admin = login(&app, "admin1", "Admin@123").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/projects",
        Some(&admin),
        Some(json!({ "name": "Demo", "description": "d", "deadline": "2025-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let project: Project = parse(&body);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/projects/{}/members", project.id),
        Some(&admin),
        Some(json!({ "members": ["dev1"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let detail: ProjectDetail = parse(&body);
    assert!(detail.assigned_members.contains("dev1"));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/projects/{}/complete", project.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/dashboard", Some(&admin), None).await;
    let view: DashboardView = parse(&body);
    assert_eq!(view.kind, ViewKind::Admin);
    assert_eq!(view.statistics.completed_projects, 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/projects/{}", project.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, "/dashboard", Some(&admin), None).await;
    let view: DashboardView = parse(&body);
    assert_eq!(view.statistics.total_projects, 0);
}

#[tokio::test]
async fn developer_cannot_create_or_see_unassigned_projects() {
    let app = app();
    let admin = login(&app, "admin1", "Admin@123").await;
    let dev = login(&app, "dev1", "Dev@123").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/projects",
        Some(&dev),
        Some(json!({ "name": "Mine", "deadline": "2025-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(
        &app,
        Method::POST,
        "/projects",
        Some(&admin),
        Some(json!({ "name": "Hidden", "deadline": "2025-01-01" })),
    )
    .await;
    let project: Project = parse(&body);

    let (status, _) = send(&app, Method::GET, &format!("/projects/{}", project.id), Some(&dev), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, Method::GET, "/dashboard", Some(&dev), None).await;
    let view: DashboardView = parse(&body);
    assert_eq!(view.kind, ViewKind::Developer);
    assert!(view.projects.is_empty());
    assert!(view.users.is_none());
}

#[tokio::test]
async fn user_management_rules() {
    let app = app();
    let admin = login(&app, "admin1", "Admin@123").await;

    let new_user = json!({ "username": "dev2", "password": "X@1", "role": "Developer" });
    let (status, _) = send(&app, Method::POST, "/users", Some(&admin), Some(new_user.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::POST, "/users", Some(&admin), Some(new_user)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, "/users/admin1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/users/dev2/role",
        Some(&admin),
        Some(json!({ "role": "Project Lead" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = parse(&body);
    assert_eq!(body["role"], "Project Lead");

    let (status, _) = send(&app, Method::DELETE, "/users/dev2", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = app();
    let token = login(&app, "lead1", "Lead@123").await;

    let (status, _) = send(&app, Method::POST, "/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_over_http() {
    let app = app();
    let token = login(&app, "dev1", "Dev@123").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/account/password",
        Some(&token),
        Some(json!({ "current_password": "nope", "new_password": "N@1", "confirm_password": "N@1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/account/password",
        Some(&token),
        Some(json!({ "current_password": "Dev@123", "new_password": "N@1", "confirm_password": "N@1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = login(&app, "dev1", "N@1").await;
    let (status, _) = send(&app, Method::GET, "/dashboard", Some(&fresh), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_of_a_deleted_user_does_not_carry_over_to_a_new_account() {
    let app = app();
    let admin = login(&app, "admin1", "Admin@123").await;

    let bob = json!({ "username": "bob", "password": "Bob@123", "role": "Developer" });
    let (status, _) = send(&app, Method::POST, "/users", Some(&admin), Some(bob)).await;
    assert_eq!(status, StatusCode::CREATED);
    let old_token = login(&app, "bob", "Bob@123").await;

    let (status, _) = send(&app, Method::DELETE, "/users/bob", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let bob_admin = json!({ "username": "bob", "password": "Other@1", "role": "Admin" });
    let (status, _) = send(&app, Method::POST, "/users", Some(&admin), Some(bob_admin)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::GET, "/dashboard", Some(&old_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_then_login_over_http() {
    let app = app();
    let credentials = json!({ "username": "newbie", "password": "Pw@123" });

    let (status, body) = send(&app, Method::POST, "/signup", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = parse(&body);
    assert_eq!(body["role"], "Developer");

    let (status, _) = send(&app, Method::POST, "/signup", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let token = login(&app, "newbie", "Pw@123").await;
    let (_, body) = send(&app, Method::GET, "/dashboard", Some(&token), None).await;
    let view: DashboardView = parse(&body);
    assert_eq!(view.kind, ViewKind::Developer);
}

#[tokio::test]
async fn upload_without_a_file_name_is_rejected() {
    let app = app();
    let admin = login(&app, "admin1", "Admin@123").await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/projects",
        Some(&admin),
        Some(json!({ "name": "Docs", "deadline": "2025-01-01" })),
    )
    .await;
    let project: Project = parse(&body);

    let uri = format!("/projects/{}/documents", project.id);
    let (status, _) = send(&app, Method::POST, &uri, Some(&admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&admin),
        Some(json!({ "name": "spec.pdf", "size": 2048 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let doc: Value = parse(&body);
    assert_eq!(doc["uploaded_by"], "admin1");
}
