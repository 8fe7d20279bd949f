use classgate_types::prelude::Timestamp;
use serde::{Deserialize, Serialize};

pub const KIND_CHAT: &str = "chat";
pub const KIND_SPEAKING: &str = "speaking";

/// One stored turn. Chat turns carry `content`; speaking attempts carry
/// `transcript` and optionally the corrected sentence and feedback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub ts: i64,
}

impl HistoryEntry {
    pub fn chat(role: &str, content: impl Into<String>, ts: Timestamp) -> Self {
        Self {
            kind: KIND_CHAT.into(),
            role: role.into(),
            content: Some(content.into()),
            transcript: None,
            correct_sentence: None,
            feedback: None,
            ts: ts.0,
        }
    }

    pub fn speaking(
        transcript: impl Into<String>,
        correct_sentence: Option<String>,
        feedback: Option<String>,
        ts: Timestamp,
    ) -> Self {
        Self {
            kind: KIND_SPEAKING.into(),
            role: "user".into(),
            content: None,
            transcript: Some(transcript.into()),
            correct_sentence,
            feedback,
            ts: ts.0,
        }
    }
}
