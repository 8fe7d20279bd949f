use classgate_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct KvError(pub Box<ErrorObj>);

impl KvError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn unavailable(detail: &str) -> Self {
        KvError(Box::new(
            ErrorBuilder::new(codes::UPSTREAM_UNAVAILABLE)
                .user_msg("Storage is temporarily unavailable.")
                .dev_msg(detail)
                .build(),
        ))
    }

    pub fn wrong_type(key: &str, detail: &str) -> Self {
        KvError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Stored value has an unexpected shape.")
                .dev_msg(format!("key {key}: {detail}"))
                .build(),
        ))
    }

    pub fn config(detail: &str) -> Self {
        KvError(Box::new(
            ErrorBuilder::new(codes::CONFIG_MISSING)
                .user_msg("Storage is not configured.")
                .dev_msg(detail)
                .build(),
        ))
    }
}

impl From<KvError> for ErrorObj {
    fn from(value: KvError) -> Self {
        value.into_inner()
    }
}
