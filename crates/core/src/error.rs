//! Error types for sift.
//!
//! A single enum covers configuration, I/O, generation back-ends, retrieval,
//! prompt rendering and input validation.

use thiserror::Error;

/// Unified error type for sift.
///
/// Functions return `Result<T, AppError>` and propagate with `?`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation back-end errors that are not classified further
    #[error("LLM error: {0}")]
    Llm(String),

    /// Back-end signalled a rate limit (HTTP 429 or equivalent)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Back-end rejected the credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Back-end rejected the request as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A collaborator call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Vector index or embedding failures
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Knowledge pipeline errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Caller supplied an unusable request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the generation chain may retry the same back-end after this error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(AppError::RateLimited("429".to_string()).is_rate_limit());
        assert!(!AppError::Auth("401".to_string()).is_rate_limit());
        assert!(!AppError::InvalidRequest("400".to_string()).is_rate_limit());
        assert!(!AppError::Timeout("slow".to_string()).is_rate_limit());
    }

    #[test]
    fn test_serde_errors_convert() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
