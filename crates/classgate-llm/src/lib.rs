pub mod errors;
pub mod feedback;
pub mod model;
pub mod prelude;
pub mod provider;
pub mod tutor;

pub use errors::LlmError;
pub use tutor::{SharedTutor, TutorModel};
