use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use classgate_auth::prelude::QuotaKind;
use classgate_types::prelude::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;

use super::parse_json;
use crate::cookies::{read_cookie, USER_COOKIE};
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct CreditPayload {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditReply {
    pub ok: bool,
    pub user: String,
    pub kind: &'static str,
    pub key: String,
    pub was: i64,
    pub now: i64,
    pub credited: i64,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let secret = state.admin_secret.get()?;
    let Some(presented) = bearer(headers).filter(|token| !token.is_empty()) else {
        tracing::warn!(target = "classgate::gateway", "credit request without an admin secret");
        return Err(ApiError::forbidden());
    };
    // An empty configured secret never matches, even an empty presentation.
    if !secret.is_empty() && bool::from(presented.as_bytes().ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!(target = "classgate::gateway", "credit request with a bad admin secret");
        Err(ApiError::forbidden())
    }
}

/// Positive whole number, given as a JSON number or a numeric string.
fn parse_amount(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (amount > 0).then_some(amount)
}

/// Admin top-up: lowers a user's usage for the current month.
pub async fn add(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreditReply>, ApiError> {
    authorize(&state, &headers)?;
    let payload: CreditPayload = parse_json(&body)?;

    let user = payload
        .user
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .or_else(|| read_cookie(&headers, USER_COOKIE))
        .map(UserId)
        .ok_or_else(|| ApiError::malformed("user is required.", "credit without user"))?;
    let amount = parse_amount(&payload.amount).ok_or_else(|| {
        ApiError::malformed(
            "amount must be a number greater than zero.",
            &format!("bad credit amount {}", payload.amount),
        )
    })?;
    let kind = match payload.kind.as_deref() {
        None => QuotaKind::Messages,
        Some(raw) => QuotaKind::parse(raw).ok_or_else(|| {
            ApiError::malformed(
                "kind must be messages or speaking.",
                &format!("unknown quota kind {raw}"),
            )
        })?,
    };

    let receipt = state.quota.get()?.credit(kind, &user, amount).await?;
    Ok(Json(CreditReply {
        ok: true,
        user: user.0,
        kind: kind.as_str(),
        key: receipt.key,
        was: receipt.was,
        now: receipt.now,
        credited: receipt.credited,
    }))
}
