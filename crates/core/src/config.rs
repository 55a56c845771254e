//! Configuration management for sift.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.sift/config.yaml` in the workspace, or `SIFT_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .sift/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Thresholds, budgets and timeouts of the answer pipeline
    pub pipeline: PipelineConfig,

    /// Generation back-ends and retry policy
    pub generation: GenerationConfig,
}

/// Tunables of the evidence pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Scores below this are answered cautiously
    pub confidence_threshold: f32,

    /// Scores below this are refused
    pub refuse_threshold: f32,

    /// Scores at or above this are labelled High
    pub high_confidence: f32,

    /// Languages every query is also translated into for retrieval
    pub pivot_languages: Vec<String>,

    /// Number of web results requested when web search is enabled
    pub web_results_count: usize,

    pub index_timeout_ms: u64,
    pub web_search_timeout_ms: u64,
    pub translation_timeout_ms: u64,

    /// Attach the reasoning chain to every answer
    pub include_reasoning_chain: bool,

    /// Conversation history cap per session
    pub max_messages: usize,

    /// Tracked entity cap per session
    pub max_entities: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            refuse_threshold: 0.3,
            high_confidence: 0.8,
            pivot_languages: vec!["en".to_string(), "hi".to_string()],
            web_results_count: 5,
            index_timeout_ms: 10_000,
            web_search_timeout_ms: 8_000,
            translation_timeout_ms: 5_000,
            include_reasoning_chain: true,
            max_messages: 20,
            max_entities: 15,
        }
    }
}

/// Ordered generation back-ends plus the shared retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Tried in order until one produces text
    pub backends: Vec<BackendConfig>,

    pub retry: RetryConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendConfig::Gemini {
                    api_key_env: "GEMINI_API_KEY".to_string(),
                    model: "gemini-2.0-flash".to_string(),
                    endpoint: None,
                    timeout: Some(30),
                },
                BackendConfig::OpenRouter {
                    api_key_env: "OPENROUTER_API_KEY".to_string(),
                    model: "google/gemini-flash-1.5".to_string(),
                    endpoint: None,
                    timeout: Some(30),
                },
                BackendConfig::Ollama {
                    endpoint: "http://localhost:11434".to_string(),
                    model: "llama3.2:3b".to_string(),
                    timeout: Some(120),
                },
            ],
            retry: RetryConfig::default(),
        }
    }
}

/// Rate-limit retry policy applied per back-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 8_000,
        }
    }
}

/// One generation back-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    OpenRouter {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl BackendConfig {
    /// Canonical back-end name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gemini { .. } => "gemini",
            Self::OpenRouter { .. } => "openrouter",
            Self::Ollama { .. } => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini { model, .. } | Self::OpenRouter { model, .. } | Self::Ollama { model, .. } => {
                model
            }
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Gemini { endpoint, .. } | Self::OpenRouter { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }

    /// Per-call timeout in seconds, if configured.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            Self::Gemini { timeout, .. }
            | Self::OpenRouter { timeout, .. }
            | Self::Ollama { timeout, .. } => *timeout,
        }
    }

    /// Name of the environment variable holding the API key.
    pub fn api_key_env(&self) -> Option<&str> {
        match self {
            Self::Gemini { api_key_env, .. } | Self::OpenRouter { api_key_env, .. } => {
                Some(api_key_env)
            }
            Self::Ollama { .. } => None,
        }
    }

    /// Resolve the API key from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    pipeline: Option<PipelineConfig>,
    generation: Option<GenerationConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            pipeline: PipelineConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `SIFT_WORKSPACE`: Override workspace path
    /// - `SIFT_CONFIG`: Path to config file
    /// - `SIFT_CONFIDENCE_THRESHOLD`: Cautious-answer threshold
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use sift_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("SIFT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("SIFT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.sift_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(threshold) = std::env::var("SIFT_CONFIDENCE_THRESHOLD") {
            config.pipeline.confidence_threshold = threshold.parse().map_err(|_| {
                AppError::Config(format!(
                    "SIFT_CONFIDENCE_THRESHOLD is not a number: {}",
                    threshold
                ))
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        confidence_threshold: Option<f32>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(threshold) = confidence_threshold {
            self.pipeline.confidence_threshold = threshold;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .sift directory.
    pub fn sift_dir(&self) -> PathBuf {
        self.workspace.join(".sift")
    }

    /// Validate thresholds and the generation chain.
    pub fn validate(&self) -> AppResult<()> {
        let p = &self.pipeline;

        for (name, value) in [
            ("confidenceThreshold", p.confidence_threshold),
            ("refuseThreshold", p.refuse_threshold),
            ("highConfidence", p.high_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if p.refuse_threshold > p.confidence_threshold || p.confidence_threshold > p.high_confidence
        {
            return Err(AppError::Config(format!(
                "Thresholds must satisfy refuse ({}) <= confidence ({}) <= high ({})",
                p.refuse_threshold, p.confidence_threshold, p.high_confidence
            )));
        }

        if p.max_messages == 0 || p.max_entities == 0 {
            return Err(AppError::Config(
                "maxMessages and maxEntities must be positive".to_string(),
            ));
        }

        if self.generation.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }

        if self.generation.backends.is_empty() {
            return Err(AppError::Config(
                "At least one generation backend must be configured".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.confidence_threshold, 0.35);
        assert_eq!(config.pipeline.refuse_threshold, 0.3);
        assert_eq!(config.pipeline.pivot_languages, vec!["en", "hi"]);
        assert_eq!(config.generation.backends.len(), 3);
        assert_eq!(config.generation.backends[2].kind(), "ollama");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sift_dir() {
        let config = AppConfig::default();
        assert!(config.sift_dir().ends_with(".sift"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            None,
            Some(0.5),
            true,
            false,
        );

        assert_eq!(overridden.pipeline.confidence_threshold, 0.5);
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
logging:
  level: warn
  color: false
pipeline:
  confidenceThreshold: 0.4
  pivotLanguages: [en, es]
generation:
  retry:
    maxAttempts: 5
  backends:
    - kind: ollama
      endpoint: http://gpu-box:11434
      model: mistral
    - kind: openrouter
      apiKeyEnv: MY_ROUTER_KEY
      model: meta/llama
"#
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(file.path()).unwrap();

        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
        assert_eq!(merged.pipeline.confidence_threshold, 0.4);
        // Unspecified pipeline fields keep their defaults
        assert_eq!(merged.pipeline.refuse_threshold, 0.3);
        assert_eq!(merged.pipeline.pivot_languages, vec!["en", "es"]);
        assert_eq!(merged.generation.retry.max_attempts, 5);
        assert_eq!(merged.generation.retry.initial_backoff_ms, 1_000);
        assert_eq!(merged.generation.backends.len(), 2);
        assert_eq!(merged.generation.backends[0].endpoint(), Some("http://gpu-box:11434"));
        assert_eq!(merged.generation.backends[1].api_key_env(), Some("MY_ROUTER_KEY"));
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pipeline: [1, 2").unwrap();
        assert!(matches!(
            AppConfig::default().merge_yaml(file.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_validate_threshold_order() {
        let mut config = AppConfig::default();
        config.pipeline.refuse_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_backend() {
        let mut config = AppConfig::default();
        config.generation.backends.clear();
        assert!(config.validate().is_err());
    }
}
