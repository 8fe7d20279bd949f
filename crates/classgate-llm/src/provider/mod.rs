pub mod local;
pub mod openai;

pub use local::LocalEchoTutor;
pub use openai::{OpenAiConfig, OpenAiTutor};
