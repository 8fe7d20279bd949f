pub mod code;
pub mod model;
pub mod prelude;
pub mod retry;

pub use model::{ErrorBuilder, ErrorObj, PublicErrorView};
