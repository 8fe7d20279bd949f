pub use crate::errors::KvError;
pub use crate::memory::MemoryKv;
pub use crate::rest::{RestKv, RestKvConfig};
pub use crate::store::{KvStore, SharedKv, TtlState};
