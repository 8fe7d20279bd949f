pub mod chat;
pub mod credits;
pub mod history;
pub mod lti;
pub mod ops;
pub mod quota;
pub mod speaking;

use axum::body::Bytes;
use axum::http::HeaderMap;
use classgate_auth::prelude::{IdentityChannels, IdentitySource};
use classgate_types::prelude::UserId;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::cookies::{read_cookie, USER_COOKIE};
use crate::errors::ApiError;
use crate::state::AppState;

/// Identity fields a client may send in the query string or JSON body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IdentityParams {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub t: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

/// Resolves the caller from `uid`, then the app token (body before query),
/// then the `lti_user` cookie.
pub(crate) fn resolve_user(
    state: &AppState,
    headers: &HeaderMap,
    query: &IdentityParams,
    body: Option<&IdentityParams>,
) -> Result<UserId, ApiError> {
    let channels = IdentityChannels {
        uid: body
            .and_then(|b| non_blank(&b.uid))
            .or_else(|| non_blank(&query.uid)),
        body_token: body.and_then(|b| b.t.clone()),
        query_token: query.t.clone(),
        cookie: read_cookie(headers, USER_COOKIE),
    };
    let (user, source) = state
        .identity
        .resolve_with_source(&channels)
        .ok_or_else(ApiError::no_identity)?;
    tracing::debug!(
        target = "classgate::gateway",
        user = %user,
        source = match source {
            IdentitySource::Explicit => "uid",
            IdentitySource::Token => "token",
            IdentitySource::Cookie => "cookie",
        },
        "identity resolved"
    );
    Ok(user)
}

/// Lenient JSON body: an empty body reads as `{}`.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body[..]
    };
    serde_json::from_slice(raw)
        .map_err(|err| ApiError::malformed("Request body is not valid JSON.", &err.to_string()))
}
