pub use crate::decode::{decode_entry, DecodeOutcome};
pub use crate::entry::{HistoryEntry, KIND_CHAT, KIND_SPEAKING};
pub use crate::errors::HistoryError;
pub use crate::log::HistoryLog;
