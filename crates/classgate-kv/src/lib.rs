pub mod errors;
pub mod memory;
pub mod prelude;
pub mod rest;
pub mod store;

pub use errors::KvError;
pub use memory::{Command, CommandStats, MemoryKv};
pub use rest::{RestKv, RestKvConfig};
pub use store::{KvStore, SharedKv, TtlState};
