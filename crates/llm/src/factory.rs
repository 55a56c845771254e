//! LLM provider factory.
//!
//! Builds individual clients by provider name and assembles the configured
//! fallback chain.

use crate::chain::{Backend, GenerationChain, RetryPolicy};
use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient, OpenRouterClient};
use crate::types::ProviderType;
use sift_core::{AppError, AppResult, GenerationConfig};
use std::sync::Arc;
use std::time::Duration;

/// Default per-call deadline when a back-end does not set one.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("gemini", "openrouter", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key for hosted providers
///
/// # Errors
/// Returns error if the provider is unknown or a required key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    let key = match (provider_type.requires_api_key(), api_key) {
        (true, None) => {
            return Err(format!(
                "{} provider requires API key",
                provider_type.as_str()
            ))
        }
        (_, key) => key.unwrap_or_default(),
    };

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => Arc::new(OllamaClient::with_base_url(
            endpoint.unwrap_or("http://localhost:11434"),
        )),
        ProviderType::Gemini => match endpoint {
            Some(url) => Arc::new(GeminiClient::with_base_url(url, key)),
            None => Arc::new(GeminiClient::new(key)),
        },
        ProviderType::OpenRouter => match endpoint {
            Some(url) => Arc::new(OpenRouterClient::with_base_url(url, key)),
            None => Arc::new(OpenRouterClient::new(key)),
        },
    };

    Ok(client)
}

/// Assemble the configured fallback chain.
///
/// Hosted back-ends whose API key variable is unset are skipped with a warning.
/// Fails only when no back-end remains.
pub fn build_chain(config: &GenerationConfig) -> AppResult<GenerationChain> {
    let mut chain = GenerationChain::new(RetryPolicy::from(&config.retry));

    for backend in &config.backends {
        let api_key = backend.resolve_api_key();
        if backend.api_key_env().is_some() && api_key.is_none() {
            tracing::warn!(
                "Skipping {} backend: {} is not set",
                backend.kind(),
                backend.api_key_env().unwrap_or_default()
            );
            continue;
        }

        let client = create_client(backend.kind(), backend.endpoint(), api_key.as_deref())
            .map_err(AppError::Config)?;
        let timeout = Duration::from_secs(backend.timeout_secs().unwrap_or(DEFAULT_TIMEOUT_SECS));

        chain = chain.with_backend(Backend::new(client, backend.model(), timeout));
    }

    if chain.is_empty() {
        return Err(AppError::Config(
            "No usable generation backend (set an API key or configure ollama)".to_string(),
        ));
    }

    tracing::debug!("Generation chain: {}", chain.labels().join(" -> "));
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::{BackendConfig, RetryConfig};

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        assert!(create_client("ollama", Some("http://localhost:8080"), None).is_ok());
    }

    #[test]
    fn test_hosted_requires_api_key() {
        match create_client("gemini", None, None) {
            Err(err) => assert!(err.contains("requires API key")),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
        assert!(create_client("openrouter", None, Some("k")).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_build_chain_skips_missing_keys() {
        let config = GenerationConfig {
            backends: vec![
                BackendConfig::Gemini {
                    api_key_env: "SIFT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
                    model: "gemini-2.0-flash".to_string(),
                    endpoint: None,
                    timeout: None,
                },
                BackendConfig::Ollama {
                    endpoint: "http://localhost:11434".to_string(),
                    model: "llama3.2:3b".to_string(),
                    timeout: Some(5),
                },
            ],
            retry: RetryConfig::default(),
        };

        let chain = build_chain(&config).unwrap();
        assert_eq!(chain.labels(), vec!["ollama/llama3.2:3b".to_string()]);
    }

    #[test]
    fn test_build_chain_fails_when_nothing_usable() {
        let config = GenerationConfig {
            backends: vec![BackendConfig::OpenRouter {
                api_key_env: "SIFT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
                model: "m".to_string(),
                endpoint: None,
                timeout: None,
            }],
            retry: RetryConfig::default(),
        };

        assert!(build_chain(&config).is_err());
    }
}
