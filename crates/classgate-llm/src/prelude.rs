pub use crate::errors::LlmError;
pub use crate::feedback::{pronunciation_feedback, PronunciationFeedback};
pub use crate::model::{AudioClip, ChatMessage};
pub use crate::provider::{LocalEchoTutor, OpenAiConfig, OpenAiTutor};
pub use crate::tutor::{SharedTutor, TutorModel, CHAT_TEMPERATURE};
