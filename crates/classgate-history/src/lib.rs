pub mod decode;
pub mod entry;
pub mod errors;
pub mod log;
pub mod prelude;

pub use entry::HistoryEntry;
pub use errors::HistoryError;
pub use log::HistoryLog;
