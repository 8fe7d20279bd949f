use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use classgate_auth::prelude::QuotaKind;
use classgate_types::prelude::Period;
use serde::Serialize;

use super::{resolve_user, IdentityParams};
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MessageQuota {
    pub user: String,
    pub key: String,
    pub used: i64,
    pub remaining: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingQuota {
    pub user_id: String,
    pub key: String,
    pub used_seconds: i64,
    pub limit_seconds: i64,
    pub remaining_seconds: i64,
}

pub async fn message_quota(
    State(state): State<AppState>,
    Query(query): Query<IdentityParams>,
    headers: HeaderMap,
) -> Result<Json<MessageQuota>, ApiError> {
    let user = resolve_user(&state, &headers, &query, None)?;
    let ledger = state.quota.get()?;
    let usage = ledger.usage(QuotaKind::Messages, &user).await?;
    Ok(Json(MessageQuota {
        key: ledger.key(QuotaKind::Messages, &user, Period::current()),
        user: user.0,
        used: usage.used,
        remaining: usage.remaining,
        limit: usage.limit,
    }))
}

pub async fn speaking_quota(
    State(state): State<AppState>,
    Query(query): Query<IdentityParams>,
    headers: HeaderMap,
) -> Result<Json<SpeakingQuota>, ApiError> {
    let user = resolve_user(&state, &headers, &query, None)?;
    let ledger = state.quota.get()?;
    let usage = ledger.usage(QuotaKind::Speaking, &user).await?;
    Ok(Json(SpeakingQuota {
        key: ledger.key(QuotaKind::Speaking, &user, Period::current()),
        user_id: user.0,
        used_seconds: usage.used,
        limit_seconds: usage.limit,
        remaining_seconds: usage.remaining,
    }))
}
