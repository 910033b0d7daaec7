use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use school_ideas::{
    api::create_router,
    app_state::AppState,
    domains::profile::NewProfile,
    infrastructure::viewer::ViewerContext,
    models::UserRole,
};

async fn app() -> Router {
    create_router(AppState::in_memory().await.unwrap())
}

/// Staff accounts are provisioned out of band, not through self-registration.
async fn staff(state: &AppState, username: &str, role: UserRole) -> String {
    state
        .profiles
        .create_profile(
            &ViewerContext::system("test-setup".into()),
            NewProfile {
                id: None,
                username: username.to_string(),
                full_name: Some(username.to_string()),
                role: Some(role),
            },
        )
        .await
        .unwrap()
        .id
        .to_string()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user));
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
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/profiles",
        None,
        Some(json!({ "username": username, "full_name": username })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "student");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_idea_submission_review_and_vote_over_http() {
    let state = AppState::in_memory().await.unwrap();
    let teacher = staff(&state, "mjohnson", UserRole::Teacher).await;
    let app = create_router(state);
    let student = register(&app, "johnstudent").await;

    let idea = json!({
        "title": "Install Solar Panels on School Roof",
        "description": "Lower bills",
        "category": "Environment"
    });

    let (status, body) = send(&app, Method::POST, "/api/v1/ideas", None, Some(idea.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let (status, body) = send(&app, Method::POST, "/api/v1/ideas", Some(&student), Some(idea)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "new");
    assert_eq!(body["votes"], 0);
    assert_eq!(body["author_name"], "johnstudent");
    let id = body["id"].as_str().unwrap().to_string();

    let review = format!("/api/v1/ideas/{}/teacher-review", id);
    let (status, _) = send(
        &app,
        Method::POST,
        &review,
        Some(&teacher),
        Some(json!({ "action": "reject", "notes": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        &review,
        Some(&student),
        Some(json!({ "action": "start-review" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        &review,
        Some(&teacher),
        Some(json!({ "action": "forward", "notes": "Needs budget review" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "forwarded");
    assert_eq!(body["principal_status"], "pending");

    let (status, _) = send(
        &app,
        Method::POST,
        &review,
        Some(&teacher),
        Some(json!({ "action": "forward", "notes": "Needs budget review" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let votes = format!("/api/v1/ideas/{}/votes", id);
    let (status, body) = send(
        &app,
        Method::POST,
        &votes,
        Some(&student),
        Some(json!({ "vote_type": "up" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes"], 1);
    assert_eq!(body["user_vote"], "up");

    let (status, body) = send(&app, Method::GET, "/api/v1/ideas/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["forwarded"], 1);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/ideas?category=Environment&sort=popular",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["user_vote"], "up");
}

#[tokio::test]
async fn test_bad_credentials_are_rejected() {
    let app = app().await;
    let unknown = uuid::Uuid::new_v4().to_string();
    let (status, _) = send(&app, Method::GET, "/api/v1/ideas", Some(&unknown), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/v1/ideas", Some("not-a-uuid"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Anonymous reads are fine
    let (status, body) = send(&app, Method::GET, "/api/v1/ideas", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_missing_idea_is_not_found() {
    let app = app().await;
    let uri = format!("/api/v1/ideas/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_self_registration_cannot_claim_staff_roles() {
    let state = AppState::in_memory().await.unwrap();
    let admin = staff(&state, "office_admin", UserRole::Student).await;
    state
        .profiles
        .set_role(
            &ViewerContext::system("test-setup".into()),
            admin.parse().unwrap(),
            UserRole::Admin,
        )
        .await
        .unwrap();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/profiles",
        None,
        Some(json!({ "username": "mallory", "role": "principal" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let student = register(&app, "johnstudent").await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/profiles",
        Some(&student),
        Some(json!({ "username": "mallory", "role": "teacher" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/profiles",
        Some(&admin),
        Some(json!({ "username": "mjohnson", "role": "teacher" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "teacher");

    let (status, body) = send(&app, Method::GET, "/api/v1/profiles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|profile| profile["username"] != "mallory"));
}

#[tokio::test]
async fn test_social_links_over_http() {
    let app = app().await;
    let student = register(&app, "johnstudent").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/profiles/me/social/instagram",
        Some(&student),
        Some(json!({ "handle": "@john.builds" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instagram"], "john.builds");
    assert_eq!(body["tiktok"], Value::Null);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/profiles/me/social/tiktok",
        Some(&student),
        Some(json!({ "handle": "no spaces allowed" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/profiles/me/social/instagram",
        None,
        Some(json!({ "handle": "anyone" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/v1/profiles/me/social/instagram",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instagram"], Value::Null);
}

#[tokio::test]
async fn test_recount_is_staff_only_over_http() {
    let state = AppState::in_memory().await.unwrap();
    let teacher = staff(&state, "mjohnson", UserRole::Teacher).await;
    let app = create_router(state);
    let student = register(&app, "johnstudent").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/ideas",
        Some(&student),
        Some(json!({ "title": "Bike racks", "description": "By the gym", "category": "Facilities" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let recount = format!("/api/v1/ideas/{}/votes/recount", body["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::POST, &recount, Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, &recount, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes"], 0);
}
