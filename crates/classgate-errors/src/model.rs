use serde::Serialize;
use serde_json::{Map, Value};

use crate::code::ErrorCode;

#[derive(Clone, Debug)]
pub struct ErrorObj {
    pub code: ErrorCode,
    pub message_user: String,
    pub message_dev: Option<String>,
    pub meta: Map<String, Value>,
}

impl ErrorObj {
    pub fn http_status(&self) -> u16 {
        self.code.http_status
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code.id == code.id
    }

    /// View that is safe to hand to an end user: no developer message.
    pub fn to_public(&self) -> PublicErrorView {
        PublicErrorView {
            error: self.code.as_str(),
            detail: self.message_user.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message_dev {
            Some(dev) => write!(f, "{}: {} ({dev})", self.code.id, self.message_user),
            None => write!(f, "{}: {}", self.code.id, self.message_user),
        }
    }
}

pub struct ErrorBuilder {
    code: ErrorCode,
    message_user: Option<String>,
    message_dev: Option<String>,
    meta: Map<String, Value>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message_user: None,
            message_dev: None,
            meta: Map::new(),
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.message_user = Some(msg.into());
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.message_dev = Some(msg.into());
        self
    }

    pub fn meta_kv(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        ErrorObj {
            code: self.code,
            message_user: self
                .message_user
                .unwrap_or_else(|| "Request failed.".to_string()),
            message_dev: self.message_dev,
            meta: self.meta,
        }
    }
}

/// Wire shape of every user-visible failure: `{"error": …, "detail": …, …meta}`.
#[derive(Clone, Debug, Serialize)]
pub struct PublicErrorView {
    pub error: &'static str,
    pub detail: String,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}
