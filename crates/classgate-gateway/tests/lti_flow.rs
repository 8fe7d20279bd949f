
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use classgate_auth::model::{DEEP_LINKING_SETTINGS_CLAIM, MESSAGE_TYPE_CLAIM};
use classgate_auth::prelude::derive_user_id;
use classgate_gateway::GatewayConfig;
use harness::*;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};

fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Runs the login leg and returns the `Cookie` header the browser would
/// send back plus the issued state and nonce.
async fn login(app: &TestApp) -> (String, String, String) {
    let response = app
        .get(
            &format!("/api/lti/login?iss={ISSUER}&login_hint=hint-a&lti_message_hint=hint-b"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let cookies = set_cookies(&response);
    let state = cookie_value(&cookies, "lti_state").expect("state cookie");
    let nonce = cookie_value(&cookies, "lti_nonce").expect("nonce cookie");
    (format!("lti_state={state}; lti_nonce={nonce}"), state, nonce)
}

fn jwt_from_form(html: &str) -> String {
    let start = html.find("name=\"JWT\" value=\"").expect("jwt input") + "name=\"JWT\" value=\"".len();
    let rest = &html[start..];
    rest[..rest.find('"').expect("closing quote")].to_string()
}

fn deep_link_claims() -> Value {
    json!({
        MESSAGE_TYPE_CLAIM: "LtiDeepLinkingRequest",
        DEEP_LINKING_SETTINGS_CLAIM: {
            "deep_link_return_url": "https://canvas.example/courses/1/deep_linking_response"
        }
    })
}

#[tokio::test]
async fn login_redirects_to_platform_and_sets_session_cookies() {
    let app = TestApp::new(test_config(None));
    let response = app
        .get("/api/lti/login?login_hint=hint-a&lti_message_hint=hint-b", None)
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("{ISSUER}/api/lti/authorize_redirect?")));
    assert!(location.contains("login_hint=hint-a"));

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=300"));
    }
    let state = cookie_value(&cookies, "lti_state").unwrap();
    assert!(location.contains(&format!("state={state}")));
}

#[tokio::test]
async fn login_accepts_form_posts() {
    let app = TestApp::new(test_config(None));
    let response = app
        .post_form(
            "/api/lti/login",
            &[("iss", ISSUER), ("login_hint", "h1"), ("lti_message_hint", "h2")],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(cookie_value(&set_cookies(&response), "lti_nonce").is_some());
}

#[tokio::test]
async fn login_without_hints_is_rejected() {
    let app = TestApp::new(test_config(None));
    let response = app.get("/api/lti/login?login_hint=only", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(body_json(response).await["error"], "REQUEST.MALFORMED");
}

#[tokio::test]
async fn resource_launch_redirects_with_token_and_user_cookie() {
    let platform = platform_jwks_server().await;
    let app = TestApp::new(test_config(Some(format!("{}/jwks", platform.uri()))));
    let (cookie, state, nonce) = login(&app).await;

    let id_token = platform_token(&nonce, json!({}));
    let response = app
        .post_form(
            "/api/lti/launch",
            &[("id_token", &id_token), ("state", &state)],
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[LOCATION].to_str().unwrap().to_string();
    let token = location
        .strip_prefix(&format!("{APP_ROOT}?t="))
        .expect("redirect to app root")
        .to_string();

    let cookies = set_cookies(&response);
    let expected = derive_user_id("student@school.edu");
    assert_eq!(cookie_value(&cookies, "lti_user").as_deref(), Some(expected.as_str()));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("lti_state=;") && c.contains("Max-Age=0")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("lti_nonce=;") && c.contains("Max-Age=0")));

    let quota = app.get(&format!("/api/quota?t={token}"), None).await;
    assert_eq!(quota.status(), StatusCode::OK);
    let body = body_json(quota).await;
    assert_eq!(body["user"], expected.as_str());
    assert_eq!(body["used"], 0);
}

#[tokio::test]
async fn forged_state_is_rejected_and_session_cleared() {
    let platform = platform_jwks_server().await;
    let app = TestApp::new(test_config(Some(format!("{}/jwks", platform.uri()))));
    let (cookie, _state, nonce) = login(&app).await;

    let id_token = platform_token(&nonce, json!({}));
    let response = app
        .post_form(
            "/api/lti/launch",
            &[("id_token", &id_token), ("state", "forged")],
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let cookies = set_cookies(&response);
    assert!(cookie_value(&cookies, "lti_user").is_none());
    assert_eq!(cookie_value(&cookies, "lti_state").as_deref(), Some(""));
    assert_eq!(body_json(response).await["error"], "AUTH.REPLAY_OR_FORGERY");
}

#[tokio::test]
async fn deep_linking_request_returns_auto_post_form() {
    let platform = platform_jwks_server().await;
    let app = TestApp::new(test_config(Some(format!("{}/jwks", platform.uri()))));
    let (cookie, state, nonce) = login(&app).await;

    let id_token = platform_token(&nonce, deep_link_claims());
    let response = app
        .post_form(
            "/api/lti/launch",
            &[("id_token", &id_token), ("state", &state)],
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("action=\"https://canvas.example/courses/1/deep_linking_response\""));

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[ISSUER]);
    validation.set_issuer(&[CLIENT_ID]);
    let claims = jsonwebtoken::decode::<Value>(
        &jwt_from_form(&html),
        &DecodingKey::from_rsa_pem(TOOL_PUBLIC.as_bytes()).unwrap(),
        &validation,
    )
    .expect("tool-signed response")
    .claims;
    assert_eq!(
        claims["https://purl.imsglobal.org/spec/lti/claim/message_type"],
        "LtiDeepLinkingResponse"
    );
}

#[tokio::test]
async fn standalone_deep_link_endpoint_rejects_resource_launch() {
    let platform = platform_jwks_server().await;
    let app = TestApp::new(test_config(Some(format!("{}/jwks", platform.uri()))));
    let (cookie, state, nonce) = login(&app).await;

    let id_token = platform_token(&nonce, json!({}));
    let response = app
        .post_form(
            "/api/lti/deeplink",
            &[("id_token", &id_token), ("state", &state)],
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(cookie_value(&set_cookies(&response), "lti_nonce").as_deref(), Some(""));
}

#[tokio::test]
async fn jwks_is_public_and_cacheable() {
    let app = TestApp::new(test_config(None));
    let response = app.get("/api/lti/jwks", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=300");
    let body = body_json(response).await;
    assert_eq!(body["keys"][0]["kid"], "tool-key-1");
    assert!(body["keys"][0].get("d").is_none());
}

#[tokio::test]
async fn unconfigured_lti_reports_config_missing() {
    let app = TestApp::new(GatewayConfig::default());
    let response = app
        .get("/api/lti/login?login_hint=a&lti_message_hint=b", None)
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "CONFIG.MISSING");
}
