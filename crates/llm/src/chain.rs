//! Ordered generation fallback chain.
//!
//! Each back-end gets its own deadline. Rate-limit errors are retried on the
//! same back-end with capped exponential backoff up to a fixed attempt count;
//! any other error moves on to the next back-end immediately.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use sift_core::{AppError, AppResult, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Uniform text generation contract used by the answer pipeline.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> AppResult<String>;
}

/// One entry in the chain.
pub struct Backend {
    client: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
}

impl Backend {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    /// "provider/model" label used in logs and failure summaries.
    pub fn label(&self) -> String {
        format!("{}/{}", self.client.provider_name(), self.model)
    }
}

/// Rate-limit retry policy shared by every back-end.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_interval: Duration::from_millis(config.initial_backoff_ms),
            max_interval: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            // Attempts are bounded by max_attempts instead of wall time
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Ordered list of back-ends tried until one returns non-empty text.
pub struct GenerationChain {
    backends: Vec<Backend>,
    retry: RetryPolicy,
}

impl GenerationChain {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            backends: Vec::new(),
            retry,
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.backends.iter().map(Backend::label).collect()
    }

    async fn call_backend(&self, backend: &Backend, request: &LlmRequest) -> AppResult<LlmResponse> {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.retry.max_attempts;

        backoff::future::retry(self.retry.backoff(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let client = Arc::clone(&backend.client);
            let request = request.clone();
            let deadline = backend.timeout;
            let label = backend.label();

            async move {
                let result = match tokio::time::timeout(deadline, client.complete(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Timeout(format!(
                        "{} did not answer within {:?}",
                        label, deadline
                    ))),
                };

                result.map_err(|err| {
                    if err.is_rate_limit() && attempt < max_attempts {
                        tracing::warn!(
                            "{} rate limited (attempt {}/{}), backing off",
                            label,
                            attempt,
                            max_attempts
                        );
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }
}

#[async_trait::async_trait]
impl TextGenerator for GenerationChain {
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> AppResult<String> {
        if self.backends.is_empty() {
            return Err(AppError::Llm("No generation backends configured".to_string()));
        }

        let mut failures = Vec::new();

        for backend in &self.backends {
            let request = LlmRequest::new(prompt, &backend.model)
                .with_temperature(temperature)
                .with_max_tokens(max_tokens);

            match self.call_backend(backend, &request).await {
                Ok(response) if !response.content.trim().is_empty() => {
                    tracing::info!(
                        "Generated {} chars with {} ({} tokens)",
                        response.content.len(),
                        backend.label(),
                        response.usage.total_tokens
                    );
                    return Ok(response.content.trim().to_string());
                }
                Ok(_) => {
                    tracing::warn!("{} returned an empty response", backend.label());
                    failures.push(format!("{}: empty response", backend.label()));
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", backend.label(), e);
                    failures.push(format!("{}: {}", backend.label(), e));
                }
            }
        }

        Err(AppError::Llm(format!(
            "All generation backends failed: {}",
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmUsage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of outcomes and counts calls.
    struct ScriptedClient {
        name: String,
        script: Mutex<VecDeque<AppResult<String>>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(name: &str, script: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Llm("script exhausted".to_string())));
            next.map(|content| LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    struct SlowClient;

    #[async_trait::async_trait]
    impl LlmClient for SlowClient {
        fn provider_name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(AppError::Llm("unreachable".to_string()))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(4),
        }
    }

    fn backend(client: Arc<dyn LlmClient>) -> Backend {
        Backend::new(client, "test-model", Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_first_backend_success() {
        let primary = ScriptedClient::new("primary", vec![Ok("  answer  ".to_string())]);
        let secondary = ScriptedClient::new("secondary", vec![Ok("unused".to_string())]);
        let chain = GenerationChain::new(fast_policy(3))
            .with_backend(backend(primary.clone()))
            .with_backend(backend(secondary.clone()));

        let text = chain.generate("prompt", 0.3, 100).await.unwrap();

        assert_eq!(text, "answer");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let primary = ScriptedClient::new(
            "primary",
            vec![
                Err(AppError::RateLimited("429".to_string())),
                Err(AppError::RateLimited("429".to_string())),
                Ok("finally".to_string()),
            ],
        );
        let chain = GenerationChain::new(fast_policy(3)).with_backend(backend(primary.clone()));

        let text = chain.generate("prompt", 0.3, 100).await.unwrap();

        assert_eq!(text, "finally");
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_bounded_then_falls_back() {
        let primary = ScriptedClient::new(
            "primary",
            vec![
                Err(AppError::RateLimited("429".to_string())),
                Err(AppError::RateLimited("429".to_string())),
                Err(AppError::RateLimited("429".to_string())),
                Ok("too late".to_string()),
            ],
        );
        let local = ScriptedClient::new("local", vec![Ok("local answer".to_string())]);
        let chain = GenerationChain::new(fast_policy(3))
            .with_backend(backend(primary.clone()))
            .with_backend(backend(local.clone()));

        let text = chain.generate("prompt", 0.3, 100).await.unwrap();

        assert_eq!(text, "local answer");
        assert_eq!(primary.calls(), 3);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let primary = ScriptedClient::new(
            "primary",
            vec![
                Err(AppError::Auth("401".to_string())),
                Ok("should not be reached".to_string()),
            ],
        );
        let secondary = ScriptedClient::new("secondary", vec![Ok("fallback".to_string())]);
        let chain = GenerationChain::new(fast_policy(3))
            .with_backend(backend(primary.clone()))
            .with_backend(backend(secondary.clone()));

        assert_eq!(chain.generate("p", 0.3, 10).await.unwrap(), "fallback");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_not_retried() {
        let primary = ScriptedClient::new(
            "primary",
            vec![Err(AppError::InvalidRequest("400".to_string()))],
        );
        let chain = GenerationChain::new(fast_policy(3)).with_backend(backend(primary.clone()));

        assert!(chain.generate("p", 0.3, 10).await.is_err());
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_moves_on() {
        let primary = ScriptedClient::new("primary", vec![Ok("   ".to_string())]);
        let secondary = ScriptedClient::new("secondary", vec![Ok("real".to_string())]);
        let chain = GenerationChain::new(fast_policy(3))
            .with_backend(backend(primary))
            .with_backend(backend(secondary));

        assert_eq!(chain.generate("p", 0.3, 10).await.unwrap(), "real");
    }

    #[tokio::test]
    async fn test_timeout_moves_on() {
        let local = ScriptedClient::new("local", vec![Ok("quick".to_string())]);
        let chain = GenerationChain::new(fast_policy(3))
            .with_backend(Backend::new(Arc::new(SlowClient), "m", Duration::from_millis(20)))
            .with_backend(backend(local));

        assert_eq!(chain.generate("p", 0.3, 10).await.unwrap(), "quick");
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_every_backend() {
        let a = ScriptedClient::new("alpha", vec![Err(AppError::Llm("down".to_string()))]);
        let b = ScriptedClient::new("beta", vec![Err(AppError::Auth("bad key".to_string()))]);
        let chain = GenerationChain::new(fast_policy(2))
            .with_backend(backend(a))
            .with_backend(backend(b));

        let err = chain.generate("p", 0.3, 10).await.unwrap_err().to_string();
        assert!(err.contains("alpha/test-model"));
        assert!(err.contains("beta/test-model"));
    }

    #[tokio::test]
    async fn test_empty_chain_is_error() {
        let chain = GenerationChain::new(RetryPolicy::default());
        assert!(chain.is_empty());
        assert!(chain.generate("p", 0.3, 10).await.is_err());
    }
}
