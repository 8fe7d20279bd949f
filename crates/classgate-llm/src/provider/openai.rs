use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::LlmError;
use crate::model::{AudioClip, ChatMessage};
use crate::tutor::TutorModel;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";
const TRANSCRIPTIONS_PATH: &str = "audio/transcriptions";
const SPEECH_PATH: &str = "audio/speech";

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: Url,
    pub chat_model: String,
    pub transcribe_model: String,
    pub speech_model: String,
    pub voice: String,
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::config("llm.api_key is empty"));
        }
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|err| LlmError::config(&format!("openai base url parse failed: {err}")))?;
        Ok(Self {
            api_key,
            base_url,
            chat_model: "gpt-4o-mini".into(),
            transcribe_model: "gpt-4o-mini-transcribe".into(),
            speech_model: "gpt-4o-mini-tts".into(),
            voice: "alloy".into(),
            request_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, LlmError> {
        self.base_url = Url::parse(base_url.as_ref())
            .map_err(|err| LlmError::config(&format!("openai base url parse failed: {err}")))?;
        if !self.base_url.path().ends_with('/') {
            self.base_url
                .set_path(&format!("{}/", self.base_url.path().trim_end_matches('/')));
        }
        Ok(self)
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_transcribe_model(mut self, model: impl Into<String>) -> Self {
        self.transcribe_model = model.into();
        self
    }

    pub fn with_speech_model(mut self, model: impl Into<String>, voice: impl Into<String>) -> Self {
        self.speech_model = model.into();
        self.voice = voice.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct OpenAiTutor {
    client: Client,
    config: OpenAiConfig,
    chat_url: Url,
    transcriptions_url: Url,
    speech_url: Url,
}

impl OpenAiTutor {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|err| LlmError::config(&format!("invalid openai api key: {err}")))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| LlmError::config(&format!("openai client build failed: {err}")))?;
        let join = |path: &str| {
            config
                .base_url
                .join(path)
                .map_err(|err| LlmError::config(&format!("openai url join failed: {err}")))
        };
        Ok(Self {
            chat_url: join(CHAT_COMPLETIONS_PATH)?,
            transcriptions_url: join(TRANSCRIPTIONS_PATH)?,
            speech_url: join(SPEECH_PATH)?,
            client,
            config,
        })
    }

    async fn checked(
        &self,
        what: &str,
        sent: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, LlmError> {
        let response = sent.map_err(|err| {
            tracing::warn!(target = "classgate::llm", call = what, "openai request failed: {err}");
            LlmError::unavailable(&format!("openai {what}: {err}"))
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_http_error(what, status, &body))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: InboundMessage,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

#[async_trait]
impl TutorModel for OpenAiTutor {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages,
            temperature,
        };
        let sent = self
            .client
            .post(self.chat_url.clone())
            .json(&request)
            .send()
            .await;
        let response = self.checked("chat", sent).await?;
        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::unavailable(&format!("openai chat decode: {err}")))?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, LlmError> {
        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name())
            .mime_str(&clip.mime_type)
            .map_err(|err| LlmError::unavailable(&format!("invalid audio mime type: {err}")))?;
        let form = Form::new()
            .text("model", self.config.transcribe_model.clone())
            .part("file", part);
        let sent = self
            .client
            .post(self.transcriptions_url.clone())
            .multipart(form)
            .send()
            .await;
        let response = self.checked("transcription", sent).await?;
        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::unavailable(&format!("openai transcription decode: {err}")))?;
        Ok(body.text)
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        let request = SpeechRequest {
            model: &self.config.speech_model,
            voice: &self.config.voice,
            input: text,
        };
        let sent = self
            .client
            .post(self.speech_url.clone())
            .json(&request)
            .send()
            .await;
        let response = self.checked("speech", sent).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| LlmError::unavailable(&format!("openai speech body: {err}")))?;
        Ok(bytes.to_vec())
    }
}

fn map_http_error(what: &str, status: StatusCode, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::config(&format!("openai {what} rejected credentials ({status}): {body}"))
        }
        _ => LlmError::unavailable(&format!("openai {what} failed ({status}): {body}")),
    }
}
