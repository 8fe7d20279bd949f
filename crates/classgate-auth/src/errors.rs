use classgate_errors::prelude::*;
use classgate_kv::KvError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct AuthError(pub Box<ErrorObj>);

impl AuthError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn as_obj(&self) -> &ErrorObj {
        &self.0
    }
}

impl From<KvError> for AuthError {
    fn from(value: KvError) -> Self {
        AuthError(value.0)
    }
}

impl From<AuthError> for ErrorObj {
    fn from(value: AuthError) -> Self {
        value.into_inner()
    }
}

pub fn config_missing(what: &str) -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::CONFIG_MISSING)
            .user_msg("Service is not fully configured.")
            .dev_msg(format!("missing configuration: {what}"))
            .build(),
    ))
}

pub fn malformed(user: &str, dev: &str) -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::REQUEST_MALFORMED)
            .user_msg(user)
            .dev_msg(dev)
            .build(),
    ))
}

/// Never says which check failed; the reason only reaches the logs.
pub fn replay_or_forgery(dev: &str) -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::AUTH_REPLAY_OR_FORGERY)
            .user_msg("Launch could not be verified.")
            .dev_msg(dev)
            .build(),
    ))
}

pub fn no_identity() -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::AUTH_NO_IDENTITY)
            .user_msg("No user identity on this request.")
            .build(),
    ))
}

pub fn admin_forbidden() -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::AUTH_ADMIN_FORBIDDEN)
            .user_msg("forbidden")
            .build(),
    ))
}

pub fn provider_unavailable(detail: &str) -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::UPSTREAM_UNAVAILABLE)
            .user_msg("An upstream service is unavailable.")
            .dev_msg(detail)
            .build(),
    ))
}

pub fn internal(detail: &str) -> AuthError {
    AuthError(Box::new(
        ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
            .user_msg("Internal error.")
            .dev_msg(detail)
            .build(),
    ))
}

/// Failures of the launch handshake. Each maps onto a public error code with
/// a generic detail.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("login initiation without {0}")]
    MissingHint(&'static str),
    #[error("callback without id_token")]
    MissingToken,
    #[error("state does not match the issued session")]
    StateMismatch,
    #[error("platform token rejected: {0}")]
    TokenInvalid(String),
    #[error("nonce does not match the issued session")]
    NonceMismatch,
    #[error("deep linking request without deep_link_return_url")]
    DeepLinkSettingsMissing,
    #[error("unexpected message type {0}")]
    UnexpectedMessageType(String),
    #[error(transparent)]
    Service(#[from] AuthError),
}

impl HandshakeError {
    pub fn is_forgery(&self) -> bool {
        matches!(
            self,
            HandshakeError::StateMismatch
                | HandshakeError::TokenInvalid(_)
                | HandshakeError::NonceMismatch
        )
    }
}

impl From<HandshakeError> for AuthError {
    fn from(value: HandshakeError) -> Self {
        let dev = value.to_string();
        match value {
            HandshakeError::MissingHint(_) => {
                malformed("Launch is missing login_hint or lti_message_hint.", &dev)
            }
            HandshakeError::MissingToken => malformed("Launch is missing id_token.", &dev),
            HandshakeError::DeepLinkSettingsMissing => {
                malformed("Deep linking request has no return URL.", &dev)
            }
            HandshakeError::UnexpectedMessageType(_) => {
                malformed("Launch message type is not supported here.", &dev)
            }
            HandshakeError::StateMismatch
            | HandshakeError::TokenInvalid(_)
            | HandshakeError::NonceMismatch => replay_or_forgery(&dev),
            HandshakeError::Service(inner) => inner,
        }
    }
}

impl From<HandshakeError> for ErrorObj {
    fn from(value: HandshakeError) -> Self {
        AuthError::from(value).into_inner()
    }
}
