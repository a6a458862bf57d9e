pub mod gemini;
pub mod models;
pub mod prompt;

pub use gemini::{EventStream, GeminiClient};
pub use models::{ModelConfig, StreamEvent};
pub use prompt::RagPrompt;
