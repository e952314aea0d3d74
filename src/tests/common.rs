use axum::{
    body::{self, Body},
    http::{self, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{
    config::{AppConfig, ServerCfg, UserCfg},
    routes,
    state::AppState,
};

pub const ALICE: &str = "alice-token";
pub const BOB: &str = "bob-token";
pub const ADMIN: &str = "admin-token";

pub struct TestContext {
    pub app: Router,
    pub state: Arc<AppState>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

fn user(username: &str, token: &str, is_staff: bool) -> UserCfg {
    UserCfg { username: username.into(), token: Some(token.into()), is_staff }
}

/// Fresh in-memory app with two regular users and one staff user.
pub fn setup() -> TestContext {
    let config = AppConfig {
        server: ServerCfg::default(),
        users: vec![user("alice", ALICE, false), user("bob", BOB, false), user("admin", ADMIN, true)],
        seed_demo: false,
    };
    let state = Arc::new(AppState::from_config(config));
    let app = routes::build_router(state.clone());
    TestContext { app, state }
}

/// Send one request through the router and decode the JSON body (Null when empty).
pub async fn send(ctx: &TestContext, method: &str, uri: &str, token: Option<&str>, payload: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match payload {
        Some(json) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = ctx.app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse { status, headers, body }
}

pub async fn create_tag(ctx: &TestContext, label: &str) -> Value {
    let res = send(ctx, "POST", "/api/tags", Some(ADMIN), Some(json!({ "label": label }))).await;
    assert_eq!(res.status, StatusCode::CREATED, "tag creation failed: {}", res.body);
    res.body
}

/// Creates a draft question owned by the token's user and returns its uuid.
pub async fn create_question(ctx: &TestContext, token: &str, payload: Value) -> String {
    let res = send(ctx, "POST", "/api/questions", Some(token), Some(payload)).await;
    assert_eq!(res.status, StatusCode::CREATED, "question creation failed: {}", res.body);
    res.body["uuid"].as_str().unwrap().to_string()
}

pub async fn publish(ctx: &TestContext, uuid: &str) {
    let res = send(ctx, "POST", &format!("/api/questions/{uuid}/publish"), Some(ADMIN), None).await;
    assert_eq!(res.status, StatusCode::OK, "publish failed: {}", res.body);
}

pub async fn create_choice(ctx: &TestContext, token: &str, question: &str, text: &str, is_correct: bool) -> String {
    let res = send(
        ctx,
        "POST",
        "/api/choices",
        Some(token),
        Some(json!({ "question": question, "text": text, "is_correct": is_correct })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "choice creation failed: {}", res.body);
    res.body["uuid"].as_str().unwrap().to_string()
}
