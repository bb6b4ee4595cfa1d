mod api;
mod ollama;
pub mod prompts;
mod provider;

pub use api::OpenRouterClient;
pub use ollama::OllamaClient;
pub use provider::{LlmBackend, LlmProvider, TextGenerator};
