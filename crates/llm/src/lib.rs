//! Generation back-ends for sift.
//!
//! A provider-agnostic `LlmClient` trait with hosted and local implementations,
//! plus `GenerationChain`, which walks an ordered list of clients and retries
//! only on rate limits.
//!
//! # Providers
//! - **Gemini**: Google generative language API
//! - **OpenRouter**: OpenAI-compatible chat completions
//! - **Ollama**: Local LLM runtime
//!
//! # Example
//! ```no_run
//! use sift_llm::{GenerationChain, RetryPolicy, Backend, TextGenerator, providers::OllamaClient};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = GenerationChain::new(RetryPolicy::default()).with_backend(Backend::new(
//!     Arc::new(OllamaClient::new()),
//!     "llama3.2:3b",
//!     Duration::from_secs(60),
//! ));
//! let text = chain.generate("Hello, world!", 0.3, 200).await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use chain::{Backend, GenerationChain, RetryPolicy, TextGenerator};
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{build_chain, create_client};
pub use providers::{GeminiClient, OllamaClient, OpenRouterClient};
pub use types::ProviderType;
