use async_trait::async_trait;

use crate::errors::LlmError;
use crate::model::{AudioClip, ChatMessage};
use crate::tutor::TutorModel;

/// Offline stand-in for development and tests: echoes the last user turn,
/// returns a fixed transcript and has no voice.
#[derive(Clone, Debug)]
pub struct LocalEchoTutor {
    transcript: String,
}

impl Default for LocalEchoTutor {
    fn default() -> Self {
        Self {
            transcript: "hello world".into(),
        }
    }
}

impl LocalEchoTutor {
    pub fn with_transcript(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

#[async_trait]
impl TutorModel for LocalEchoTutor {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _temperature: f32,
    ) -> Result<String, LlmError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("echo: {last}"))
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, LlmError> {
        if clip.bytes.is_empty() {
            return Ok(String::new());
        }
        Ok(self.transcript.clone())
    }

    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, LlmError> {
        Err(LlmError::unavailable("local tutor has no speech synthesis"))
    }
}
