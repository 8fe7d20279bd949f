use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use classgate_auth::prelude::QuotaKind;
use classgate_history::HistoryEntry;
use classgate_llm::prelude::{ChatMessage, CHAT_TEMPERATURE};
use classgate_types::prelude::{Timestamp, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_json, resolve_user, IdentityParams};
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct ChatPayload {
    #[serde(default)]
    messages: Value,
    #[serde(flatten)]
    identity: IdentityParams,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub used: i64,
    pub limit: i64,
}

fn conversation(messages: Value) -> Result<Vec<ChatMessage>, ApiError> {
    let items = match messages {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(ApiError::malformed(
                "messages must be a non-empty array",
                "chat body without messages",
            ))
        }
    };
    items
        .into_iter()
        .map(serde_json::from_value::<ChatMessage>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            ApiError::malformed(
                "Each message needs a role and text content.",
                &err.to_string(),
            )
        })
}

async fn record_turn(state: &AppState, user: &UserId, question: &str, reply: &str) {
    let Some(history) = state.history.ready() else {
        return;
    };
    let ts = Timestamp::now();
    let entries = [
        HistoryEntry::chat("user", question, ts),
        HistoryEntry::chat("assistant", reply, ts),
    ];
    if let Err(err) = history.append(user, &entries).await {
        tracing::warn!(
            target = "classgate::gateway",
            user = %user,
            "chat history not saved: {err}"
        );
    }
}

/// Charges one message, asks the tutor, then records the exchange.
pub async fn chat(
    State(state): State<AppState>,
    Query(query): Query<IdentityParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    let payload: ChatPayload = parse_json(&body)?;
    let user = resolve_user(&state, &headers, &query, Some(&payload.identity))?;
    let messages = conversation(payload.messages)?;
    let quota = state.quota.get()?;
    let tutor = state.tutor.get()?;

    let check = quota
        .check_and_increment(QuotaKind::Messages, &user, 1)
        .await?;
    if check.blocked {
        return Err(ApiError::quota_exceeded(
            "Monthly message limit reached.",
            [
                ("used", json!(check.used)),
                ("limit", json!(check.limit)),
                ("packages", json!(state.packages.as_ref())),
            ],
        ));
    }

    let reply = tutor.complete(&messages, CHAT_TEMPERATURE).await?;
    let question = messages
        .iter()
        .rev()
        .find(|message| message.role == "user")
        .map(|message| message.content.as_str())
        .unwrap_or_default();
    record_turn(&state, &user, question, &reply).await;

    Ok(Json(ChatReply {
        reply,
        used: check.used,
        limit: check.limit,
    }))
}
