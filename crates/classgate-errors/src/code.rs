use serde::{Serialize, Serializer};

use crate::retry::RetryClass;

/// Stable, machine-readable error code with its transport mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub id: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        self.id
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id)
    }
}

pub mod codes {
    use super::ErrorCode;
    use crate::retry::RetryClass;

    pub const CONFIG_MISSING: ErrorCode = ErrorCode {
        id: "CONFIG.MISSING",
        http_status: 500,
        retry: RetryClass::Permanent,
    };

    pub const REQUEST_MALFORMED: ErrorCode = ErrorCode {
        id: "REQUEST.MALFORMED",
        http_status: 400,
        retry: RetryClass::None,
    };

    pub const AUTH_REPLAY_OR_FORGERY: ErrorCode = ErrorCode {
        id: "AUTH.REPLAY_OR_FORGERY",
        http_status: 400,
        retry: RetryClass::None,
    };

    pub const AUTH_NO_IDENTITY: ErrorCode = ErrorCode {
        id: "AUTH.NO_IDENTITY",
        http_status: 401,
        retry: RetryClass::None,
    };

    pub const AUTH_ADMIN_FORBIDDEN: ErrorCode = ErrorCode {
        id: "AUTH.ADMIN_FORBIDDEN",
        http_status: 403,
        retry: RetryClass::None,
    };

    pub const QUOTA_EXCEEDED: ErrorCode = ErrorCode {
        id: "QUOTA.EXCEEDED",
        http_status: 429,
        retry: RetryClass::Permanent,
    };

    pub const UPSTREAM_UNAVAILABLE: ErrorCode = ErrorCode {
        id: "UPSTREAM.UNAVAILABLE",
        http_status: 502,
        retry: RetryClass::Transient,
    };

    pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode {
        id: "UNKNOWN.INTERNAL",
        http_status: 500,
        retry: RetryClass::None,
    };
}
