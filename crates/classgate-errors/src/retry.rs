use serde::{Deserialize, Serialize};

/// Whether a caller may usefully repeat a failed request. The gateway never
/// retries on its own; the class is reported alongside the failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryClass {
    /// The request itself is wrong; repeating it fails the same way.
    None,
    /// An upstream hiccup; the same request may succeed later.
    Transient,
    /// Blocked until configuration or the billing period changes.
    Permanent,
}

impl RetryClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            RetryClass::None => "none",
            RetryClass::Transient => "transient",
            RetryClass::Permanent => "permanent",
        }
    }

    pub const fn is_retryable(self) -> bool {
        matches!(self, RetryClass::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::codes;

    #[test]
    fn only_upstream_failures_are_retryable() {
        assert!(codes::UPSTREAM_UNAVAILABLE.retry.is_retryable());
        assert!(!codes::QUOTA_EXCEEDED.retry.is_retryable());
        assert!(!codes::REQUEST_MALFORMED.retry.is_retryable());
        assert_eq!(codes::CONFIG_MISSING.retry.as_str(), "permanent");
    }
}
