use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use classgate_auth::prelude::{speaking_amount, QuotaKind};
use classgate_history::HistoryEntry;
use classgate_llm::prelude::{pronunciation_feedback, AudioClip, PronunciationFeedback};
use classgate_types::prelude::{Timestamp, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{parse_json, resolve_user, IdentityParams};
use crate::errors::ApiError;
use crate::state::AppState;

/// Base64 audio inflates the payload; a few minutes of webm fits.
pub const SPEAKING_BODY_LIMIT: usize = 25 * 1024 * 1024;

const DEFAULT_MIME_TYPE: &str = "audio/webm";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeakingPayload {
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(flatten)]
    identity: IdentityParams,
}

#[derive(Debug, Serialize)]
pub struct SpeakingReply {
    pub id: String,
    pub user: String,
    pub transcript: String,
    pub correct_sentence: Option<String>,
    pub feedback_text: String,
    #[serde(rename = "usedSeconds")]
    pub used_seconds: i64,
    #[serde(rename = "limitSeconds")]
    pub limit_seconds: i64,
    #[serde(rename = "audioBase64")]
    pub audio_base64: Option<String>,
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL.
fn decode_audio(raw: &str) -> Result<(Vec<u8>, Option<String>), ApiError> {
    let (mime, data) = match raw.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, data)) => {
            let mime = meta.trim_end_matches(";base64");
            (Some(mime.to_string()).filter(|m| !m.is_empty()), data)
        }
        None => (None, raw),
    };
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|err| ApiError::malformed("Field 'audio' must be base64.", &err.to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::malformed(
            "Field 'audio' (base64) is required.",
            "empty audio payload",
        ));
    }
    Ok((bytes, mime))
}

fn minutes(seconds: i64) -> f64 {
    (seconds as f64 / 60.0 * 10.0).round() / 10.0
}

async fn record_attempt(
    state: &AppState,
    user: &UserId,
    transcript: &str,
    feedback: &PronunciationFeedback,
) {
    let Some(history) = state.history.ready() else {
        return;
    };
    let entry = HistoryEntry::speaking(
        transcript,
        feedback.correct_sentence.clone(),
        Some(feedback.feedback_text.clone()),
        Timestamp::now(),
    );
    if let Err(err) = history.append(user, &[entry]).await {
        tracing::warn!(
            target = "classgate::gateway",
            user = %user,
            "speaking history not saved: {err}"
        );
    }
}

/// Charges the clip's duration in seconds, then transcribes, grades and
/// voices the feedback. A failed synthesis only drops the audio.
pub async fn speaking(
    State(state): State<AppState>,
    Query(query): Query<IdentityParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SpeakingReply>, ApiError> {
    let payload: SpeakingPayload = parse_json(&body)?;
    let user = resolve_user(&state, &headers, &query, Some(&payload.identity))?;
    let raw_audio = payload
        .audio
        .as_deref()
        .filter(|audio| !audio.trim().is_empty())
        .ok_or_else(|| {
            ApiError::malformed("Field 'audio' (base64) is required.", "no audio field")
        })?;
    let (bytes, data_mime) = decode_audio(raw_audio)?;
    let quota = state.quota.get()?;
    let tutor = state.tutor.get()?;

    let amount = speaking_amount(payload.duration_seconds, bytes.len(), state.bytes_per_second);
    let check = quota
        .check_and_increment(QuotaKind::Speaking, &user, amount)
        .await?;
    if check.blocked {
        return Err(ApiError::quota_exceeded(
            "Monthly speaking practice limit reached.",
            [
                ("usedSeconds", json!(check.used)),
                ("usedMinutes", json!(minutes(check.used))),
                ("limitSeconds", json!(check.limit)),
                ("limitMinutes", json!(minutes(check.limit))),
            ],
        ));
    }

    let clip = AudioClip {
        bytes,
        mime_type: payload
            .mime_type
            .or(data_mime)
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
    };
    let transcript = tutor.transcribe(&clip).await?;
    let feedback =
        pronunciation_feedback(tutor.as_ref(), &transcript, &state.feedback_language).await?;

    let speech = feedback.speech_text();
    let audio_base64 = if speech.is_empty() {
        None
    } else {
        match tutor.synthesize(&speech).await {
            Ok(audio) => Some(STANDARD.encode(audio)),
            Err(err) => {
                tracing::warn!(target = "classgate::gateway", "speech synthesis skipped: {err}");
                None
            }
        }
    };

    record_attempt(&state, &user, &transcript, &feedback).await;

    Ok(Json(SpeakingReply {
        id: uuid::Uuid::new_v4().to_string(),
        user: user.to_string(),
        transcript,
        correct_sentence: feedback.correct_sentence,
        feedback_text: feedback.feedback_text,
        used_seconds: check.used,
        limit_seconds: check.limit,
        audio_base64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bare_and_data_url_audio() {
        let (bytes, mime) = decode_audio("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, None);

        let (bytes, mime) = decode_audio("data:audio/ogg;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime.as_deref(), Some("audio/ogg"));
    }

    #[test]
    fn rejects_garbage_audio() {
        assert!(decode_audio("not base64!").is_err());
        assert!(decode_audio("data:audio/webm;base64,").is_err());
    }

    #[test]
    fn minutes_round_to_one_decimal() {
        assert_eq!(minutes(1_200), 20.0);
        assert_eq!(minutes(1_231), 20.5);
    }
}
