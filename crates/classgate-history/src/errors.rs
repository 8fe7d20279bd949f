use classgate_errors::prelude::*;
use classgate_kv::KvError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HistoryError(pub Box<ErrorObj>);

impl HistoryError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn encode(detail: &str) -> Self {
        HistoryError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("History entry could not be stored.")
                .dev_msg(detail)
                .build(),
        ))
    }
}

impl From<KvError> for HistoryError {
    fn from(value: KvError) -> Self {
        HistoryError(value.0)
    }
}

impl From<HistoryError> for ErrorObj {
    fn from(value: HistoryError) -> Self {
        value.into_inner()
    }
}
