pub mod id;
pub mod prelude;
pub mod time;
