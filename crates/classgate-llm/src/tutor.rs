use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::LlmError;
use crate::model::{AudioClip, ChatMessage};

/// The model capability the service consumes. Implementations own their
/// transport, credentials and timeouts.
#[async_trait]
pub trait TutorModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError>;

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, LlmError>;

    /// Encoded speech (mp3) for `text`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, LlmError>;
}

pub type SharedTutor = Arc<dyn TutorModel>;

pub const CHAT_TEMPERATURE: f32 = 0.7;
