use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use classgate_auth::prelude::{AuthError, HandshakeError};
use classgate_errors::prelude::{codes, ErrorBuilder, ErrorObj, RetryClass};
use classgate_history::HistoryError;
use classgate_kv::KvError;
use classgate_llm::LlmError;
use serde_json::Value;
use thiserror::Error;

/// Any failure leaving a handler. Rendered as the public error view with the
/// code's status; the developer message only reaches the log.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ApiError(pub Box<ErrorObj>);

impl ApiError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn retry(&self) -> RetryClass {
        self.0.code.retry
    }

    pub fn malformed(user: &str, dev: &str) -> Self {
        classgate_auth::errors::malformed(user, dev).into()
    }

    pub fn no_identity() -> Self {
        classgate_auth::errors::no_identity().into()
    }

    pub fn forbidden() -> Self {
        classgate_auth::errors::admin_forbidden().into()
    }

    /// 429 carrying the usage figures the client shows next to the message.
    pub fn quota_exceeded(
        user_msg: &str,
        meta: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Self {
        let builder = meta.into_iter().fold(
            ErrorBuilder::new(codes::QUOTA_EXCEEDED).user_msg(user_msg),
            |builder, (key, value)| builder.meta_kv(key, value),
        );
        ApiError(Box::new(builder.build()))
    }
}

impl From<ErrorObj> for ApiError {
    fn from(value: ErrorObj) -> Self {
        ApiError(Box::new(value))
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        ApiError(value.0)
    }
}

impl From<HandshakeError> for ApiError {
    fn from(value: HandshakeError) -> Self {
        ErrorObj::from(value).into()
    }
}

impl From<HistoryError> for ApiError {
    fn from(value: HistoryError) -> Self {
        ApiError(value.0)
    }
}

impl From<KvError> for ApiError {
    fn from(value: KvError) -> Self {
        ApiError(value.0)
    }
}

impl From<LlmError> for ApiError {
    fn from(value: LlmError) -> Self {
        ApiError(value.0)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry = self.retry();
        if status.is_server_error() {
            tracing::warn!(
                target = "classgate::gateway",
                status = status.as_u16(),
                retry = retry.as_str(),
                "{}",
                self.0
            );
        } else {
            tracing::debug!(
                target = "classgate::gateway",
                status = status.as_u16(),
                retry = retry.as_str(),
                "{}",
                self.0
            );
        }
        (status, Json(self.0.to_public())).into_response()
    }
}
