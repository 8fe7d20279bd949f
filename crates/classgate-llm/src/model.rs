use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Recorded learner audio as received from the browser.
#[derive(Clone, Debug)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn file_name(&self) -> &'static str {
        match self.mime_type.split(';').next().unwrap_or_default().trim() {
            "audio/mpeg" | "audio/mp3" => "audio.mp3",
            "audio/wav" | "audio/x-wav" => "audio.wav",
            "audio/ogg" => "audio.ogg",
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "audio.m4a",
            _ => "audio.webm",
        }
    }
}
