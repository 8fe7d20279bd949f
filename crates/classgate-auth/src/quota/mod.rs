mod ledger;

pub use ledger::{speaking_amount, CreditReceipt, QuotaCheck, QuotaLedger, QuotaUsage};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MESSAGE_LIMIT: i64 = 400;
pub const DEFAULT_SPEAKING_LIMIT_SECS: i64 = 1_200;
pub const DEFAULT_BYTES_PER_SECOND: u64 = 4_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Messages,
    Speaking,
}

impl QuotaKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "messages" | "message" | "chat" => Some(QuotaKind::Messages),
            "speaking" | "speaking_seconds" => Some(QuotaKind::Speaking),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::Messages => "messages",
            QuotaKind::Speaking => "speaking",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub prefix: String,
    pub limit: i64,
}

impl QuotaPolicy {
    pub fn messages_default() -> Self {
        Self {
            prefix: "quota".into(),
            limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    pub fn speaking_default() -> Self {
        Self {
            prefix: "speaking".into(),
            limit: DEFAULT_SPEAKING_LIMIT_SECS,
        }
    }
}
