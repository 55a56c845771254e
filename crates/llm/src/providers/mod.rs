//! Concrete `LlmClient` implementations.

pub mod gemini;
pub mod ollama;
pub mod openrouter;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openrouter::OpenRouterClient;
