use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use classgate_history::HistoryEntry;
use serde::{Deserialize, Serialize};

use super::{resolve_user, IdentityParams};
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(flatten)]
    identity: IdentityParams,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    pub ok: bool,
}

fn parse_limit(raw: Option<&str>) -> Result<Option<usize>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse::<usize>().map(Some).map_err(|_| {
            ApiError::malformed(
                "limit must be a non-negative integer.",
                &format!("bad history limit {value}"),
            )
        }),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<HistoryPage>, ApiError> {
    let limit = parse_limit(query.limit.as_deref())?;
    let user = resolve_user(&state, &headers, &query.identity, None)?;
    let kind = query.kind.as_deref().filter(|k| !k.is_empty());
    let items = state.history.get()?.read(&user, limit, kind).await?;
    Ok(Json(HistoryPage { items }))
}

pub async fn clear(
    State(state): State<AppState>,
    Query(query): Query<IdentityParams>,
    headers: HeaderMap,
) -> Result<Json<Cleared>, ApiError> {
    let user = resolve_user(&state, &headers, &query, None)?;
    state.history.get()?.clear(&user).await?;
    tracing::info!(target = "classgate::gateway", user = %user, "history cleared");
    Ok(Json(Cleared { ok: true }))
}
