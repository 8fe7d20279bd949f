
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use classgate_auth::prelude::AppTokenService;
use classgate_kv::KvStore;
use classgate_types::prelude::{Period, UserId};
use harness::*;
use serde_json::{json, Value};

fn message_key(user: &str) -> String {
    format!("quota:{}:{user}", Period::current().label())
}

fn app_token(user: &str) -> String {
    AppTokenService::new(APP_SECRET)
        .unwrap()
        .issue(&UserId::new(user))
        .unwrap()
}

async fn add_credits(app: &TestApp, bearer: &str, body: Value) -> axum::http::Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/credits/add")
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.call(request).await
}

#[tokio::test]
async fn quota_without_identity_is_unauthorized() {
    let app = TestApp::new(test_config(None));
    let response = app.get("/api/quota", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "AUTH.NO_IDENTITY");
}

#[tokio::test]
async fn quota_reports_monthly_usage_for_cookie_user() {
    let app = TestApp::new(test_config(None));
    app.kv.set(&message_key("u-cookie"), "17").await.unwrap();

    let response = app.get("/api/quota", Some("lti_user=u-cookie")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"], "u-cookie");
    assert_eq!(body["key"], message_key("u-cookie"));
    assert_eq!(body["used"], 17);
    assert_eq!(body["remaining"], 383);
    assert_eq!(body["limit"], 400);
}

#[tokio::test]
async fn app_token_takes_precedence_over_cookie() {
    let app = TestApp::new(test_config(None));
    let token = app_token("u-token");
    let response = app
        .get(&format!("/api/quota?t={token}"), Some("lti_user=u-cookie"))
        .await;
    assert_eq!(body_json(response).await["user"], "u-token");
}

#[tokio::test]
async fn chat_is_blocked_once_the_month_is_spent() {
    let app = TestApp::new(test_config(None));
    app.kv.set(&message_key("u-1"), "399").await.unwrap();
    let body = json!({"uid": "u-1", "messages": [{"role": "user", "content": "hi"}]});

    let response = app.post_json("/api/chat", body.clone(), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["used"], 400);
    assert_eq!(reply["limit"], 400);
    assert_eq!(reply["reply"], "echo: hi");

    let response = app.post_json("/api/chat", body, None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let refused = body_json(response).await;
    assert_eq!(refused["error"], "QUOTA.EXCEEDED");
    assert_eq!(refused["used"], 401);
    assert_eq!(refused["limit"], 400);
    assert_eq!(refused["packages"][0]["amount"], 50);
}

#[tokio::test]
async fn first_charge_of_the_month_sets_expiry() {
    let app = TestApp::new(test_config(None));
    let body = json!({"uid": "u-2", "messages": [{"role": "user", "content": "hello"}]});
    let response = app.post_json("/api/chat", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let ttl = app.kv.ttl(&message_key("u-2")).await.unwrap();
    assert!(!ttl.needs_expiry());
}

#[tokio::test]
async fn credits_reduce_usage_for_the_named_user() {
    let app = TestApp::new(test_config(None));
    app.kv.set(&message_key("u-3"), "120").await.unwrap();

    let response = add_credits(&app, ADMIN_SECRET, json!({"user": "u-3", "amount": 50})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["was"], 120);
    assert_eq!(body["now"], 70);
    assert_eq!(body["credited"], 50);
    assert_eq!(
        app.kv.get(&message_key("u-3")).await.unwrap().as_deref(),
        Some("70")
    );
}

#[tokio::test]
async fn credits_never_push_usage_below_zero() {
    let app = TestApp::new(test_config(None));
    app.kv.set(&message_key("u-4"), "10").await.unwrap();

    let response = add_credits(&app, ADMIN_SECRET, json!({"user": "u-4", "amount": "25"})).await;
    let body = body_json(response).await;
    assert_eq!(body["was"], 10);
    assert_eq!(body["now"], 0);
}

#[tokio::test]
async fn credits_require_the_admin_secret() {
    let app = TestApp::new(test_config(None));
    let response = add_credits(&app, "guess", json!({"user": "u-5", "amount": 5})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "AUTH.ADMIN_FORBIDDEN");
}

#[tokio::test]
async fn credits_reject_non_positive_amounts() {
    let app = TestApp::new(test_config(None));
    for amount in [json!(0), json!(-3), json!("many"), json!(null)] {
        let response = add_credits(&app, ADMIN_SECRET, json!({"user": "u-6", "amount": amount})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{amount}");
    }
}

#[tokio::test]
async fn speaking_quota_reports_seconds() {
    let app = TestApp::new(test_config(None));
    let key = format!("speaking:{}:u-7", Period::current().label());
    app.kv.set(&key, "90").await.unwrap();

    let response = app.get("/api/speaking-quota?uid=u-7", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["userId"], "u-7");
    assert_eq!(body["usedSeconds"], 90);
    assert_eq!(body["limitSeconds"], 1200);
    assert_eq!(body["remainingSeconds"], 1110);
}

#[tokio::test]
async fn blank_admin_secret_file_leaves_credits_unconfigured() {
    let path = std::env::temp_dir().join(format!("classgate-admin-{}", uuid::Uuid::new_v4()));
    std::fs::write(&path, "\n").unwrap();
    let mut config = test_config(None);
    config.admin.secret = None;
    config.admin.secret_file = Some(path.to_string_lossy().into_owned());
    let app = TestApp::new(config);

    let request = Request::builder()
        .method("POST")
        .uri("/api/credits/add")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"user": "abc", "amount": 5}).to_string()))
        .unwrap();
    let response = app.call(request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "CONFIG.MISSING");
    assert_eq!(app.kv.get(&message_key("abc")).await.unwrap(), None);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn credits_without_authorization_header_are_forbidden() {
    let app = TestApp::new(test_config(None));
    let request = Request::builder()
        .method("POST")
        .uri("/api/credits/add")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"user": "abc", "amount": 5}).to_string()))
        .unwrap();
    let response = app.call(request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = add_credits(&app, "", json!({"user": "abc", "amount": 5})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
