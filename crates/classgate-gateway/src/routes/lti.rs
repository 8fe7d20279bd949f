use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Response};
use classgate_auth::prelude::*;
use serde::Deserialize;

use crate::cookies::{
    clear_session, read_cookie, session_cookie, user_cookie, NONCE_COOKIE, STATE_COOKIE,
};
use crate::errors::ApiError;
use crate::state::AppState;

const JWKS_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub login_hint: Option<String>,
    #[serde(default)]
    pub lti_message_hint: Option<String>,
}

fn form_fields(body: &Bytes) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

pub async fn login_get(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Result<Response, ApiError> {
    initiate(&state, params)
}

/// Platforms may post the initiation as a form; fields missing from the
/// form fall back to the query string.
pub async fn login_post(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut form = form_fields(&body);
    let merged = LoginParams {
        iss: form.remove("iss").or(params.iss),
        login_hint: form.remove("login_hint").or(params.login_hint),
        lti_message_hint: form.remove("lti_message_hint").or(params.lti_message_hint),
    };
    initiate(&state, merged)
}

fn initiate(state: &AppState, params: LoginParams) -> Result<Response, ApiError> {
    let handshake = state.handshake.get()?;
    let redirect = handshake.initiate_login(&LoginRequest {
        iss: params.iss,
        login_hint: params.login_hint,
        lti_message_hint: params.lti_message_hint,
    })?;
    Ok((
        StatusCode::FOUND,
        AppendHeaders([
            (LOCATION, redirect.location),
            (SET_COOKIE, session_cookie(STATE_COOKIE, &redirect.session.state)),
            (SET_COOKIE, session_cookie(NONCE_COOKIE, &redirect.session.nonce)),
        ]),
    )
        .into_response())
}

fn callback_inputs(headers: &HeaderMap, body: &Bytes) -> (CallbackRequest, StoredSession) {
    let mut form = form_fields(body);
    let request = CallbackRequest {
        id_token: form.remove("id_token"),
        state: form.remove("state"),
    };
    let stored = StoredSession {
        state: read_cookie(headers, STATE_COOKIE),
        nonce: read_cookie(headers, NONCE_COOKIE),
    };
    (request, stored)
}

/// The handshake cookies are single-use: every callback response expires
/// them, whatever the outcome.
fn clearing_session(mut response: Response) -> Response {
    for cookie in clear_session() {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

fn deep_link_page(delivery: DeepLinkDelivery) -> Response {
    tracing::info!(
        target = "classgate::gateway",
        return_url = %delivery.return_url,
        "deep link response delivered"
    );
    Html(delivery.html).into_response()
}

pub async fn launch(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (request, stored) = callback_inputs(&headers, &body);
    let outcome = match state.handshake.get() {
        Ok(handshake) => handshake
            .complete_callback(&request, &stored)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    let response = match outcome {
        Ok(LaunchOutcome::Launch(launch)) => (
            StatusCode::FOUND,
            AppendHeaders([
                (LOCATION, launch.redirect),
                (SET_COOKIE, user_cookie(launch.user.as_str())),
            ]),
        )
            .into_response(),
        Ok(LaunchOutcome::DeepLink(delivery)) => deep_link_page(delivery),
        Err(err) => err.into_response(),
    };
    clearing_session(response)
}

/// Callback endpoint registered as the deep-linking redirect; resource
/// launches sent here are rejected.
pub async fn deep_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (request, stored) = callback_inputs(&headers, &body);
    let outcome = match state.handshake.get() {
        Ok(handshake) => handshake
            .complete_deep_link(&request, &stored)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    let response = match outcome {
        Ok(delivery) => deep_link_page(delivery),
        Err(err) => err.into_response(),
    };
    clearing_session(response)
}

pub async fn jwks(State(state): State<AppState>) -> Result<Response, ApiError> {
    let keys = state.tool_keys.get()?;
    Ok((
        [
            (CONTENT_TYPE, "application/json; charset=utf-8"),
            (CACHE_CONTROL, JWKS_CACHE_CONTROL),
        ],
        keys.as_json().to_string(),
    )
        .into_response())
}
