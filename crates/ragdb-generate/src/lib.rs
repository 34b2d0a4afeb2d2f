//! Answer generation over retrieved context.

pub mod ollama;
pub mod prompt;

pub use ollama::{FragmentStream, OllamaClient, StreamLine};
pub use prompt::build_prompt;
