pub mod authn;
pub mod errors;
pub mod identity;
pub mod lti;
pub mod model;
pub mod prelude;
pub mod quota;

pub use errors::{AuthError, HandshakeError};
