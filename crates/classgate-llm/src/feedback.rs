use serde::{Deserialize, Serialize};

use crate::errors::LlmError;
use crate::model::ChatMessage;
use crate::tutor::TutorModel;

pub const FEEDBACK_TEMPERATURE: f32 = 0.4;
const UNREADABLE_REPLY: &str = "The tutor's reply could not be interpreted.";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationFeedback {
    pub correct_sentence: Option<String>,
    pub feedback_text: String,
}

impl PronunciationFeedback {
    /// What the synthesized answer should say.
    pub fn speech_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(sentence) = self.correct_sentence.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("The correct sentence is: {sentence}"));
        }
        if !self.feedback_text.is_empty() {
            parts.push(self.feedback_text.clone());
        }
        parts.join(". ")
    }
}

pub fn pronunciation_prompt(transcript: &str, language: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You are an English teacher who specialises in pronunciation. The learner said one \
             sentence in English; the transcript below is approximate and may contain errors.\n\
             Always answer with bare JSON of the form:\n\
             {{\"correct_sentence\": \"the corrected sentence in English\", \
             \"feedback_text\": \"a short explanation in {language} of the main pronunciation points\"}}\n\
             Do not write anything outside the JSON."
        )),
        ChatMessage::user(format!(
            "Approximate transcript of what the learner said:\n\"\"\"{transcript}\"\"\"\n\
             1) Put the correct English sentence in \"correct_sentence\".\n\
             2) In \"feedback_text\", explain simply, in {language}, what to improve."
        )),
    ]
}

#[derive(Deserialize)]
struct RawFeedback {
    #[serde(default)]
    correct_sentence: Option<String>,
    #[serde(default)]
    feedback_text: Option<String>,
}

/// Model output is expected to be JSON; anything else is kept as the
/// feedback text with no corrected sentence.
pub fn parse_feedback(content: &str) -> PronunciationFeedback {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    match serde_json::from_str::<RawFeedback>(unfenced) {
        Ok(raw) => PronunciationFeedback {
            correct_sentence: raw.correct_sentence.filter(|s| !s.trim().is_empty()),
            feedback_text: raw.feedback_text.unwrap_or_default(),
        },
        Err(_) if trimmed.is_empty() => PronunciationFeedback {
            correct_sentence: None,
            feedback_text: UNREADABLE_REPLY.into(),
        },
        Err(_) => PronunciationFeedback {
            correct_sentence: None,
            feedback_text: trimmed.to_string(),
        },
    }
}

pub async fn pronunciation_feedback(
    model: &dyn TutorModel,
    transcript: &str,
    language: &str,
) -> Result<PronunciationFeedback, LlmError> {
    let reply = model
        .complete(&pronunciation_prompt(transcript, language), FEEDBACK_TEMPERATURE)
        .await?;
    Ok(parse_feedback(&reply))
}
