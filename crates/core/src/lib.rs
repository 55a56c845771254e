//! Sift Core Library
//!
//! Foundational pieces shared by every sift crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging setup
//! - Configuration loading (pipeline thresholds, generation back-ends)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, BackendConfig, GenerationConfig, PipelineConfig, RetryConfig};
pub use error::{AppError, AppResult};
