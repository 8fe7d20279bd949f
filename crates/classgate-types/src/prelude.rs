pub use crate::id::UserId;
pub use crate::time::{Period, Timestamp};
