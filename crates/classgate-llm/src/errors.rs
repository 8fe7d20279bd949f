use classgate_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct LlmError(pub Box<ErrorObj>);

impl LlmError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn unavailable(detail: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::UPSTREAM_UNAVAILABLE)
                .user_msg("The tutor model is unavailable right now.")
                .dev_msg(detail)
                .build(),
        ))
    }

    pub fn config(detail: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::CONFIG_MISSING)
                .user_msg("The tutor model is not configured.")
                .dev_msg(detail)
                .build(),
        ))
    }
}

impl From<LlmError> for ErrorObj {
    fn from(value: LlmError) -> Self {
        value.into_inner()
    }
}
