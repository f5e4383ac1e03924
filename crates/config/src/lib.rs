//! Configuration loading, validation, and management for PyCoach.
//!
//! Loads configuration from `pycoach.toml` (or the path given with
//! `--config` / `PYCOACH_CONFIG`) with environment variable overrides.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pycoach.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosted language-model backend
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Locally hosted language-model backend
    #[serde(default)]
    pub local: LocalConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Document index and similarity search
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Cross-encoder reranking
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Conversation memory
    #[serde(default)]
    pub session: SessionConfig,

    /// Learner profile storage
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Provider name used in logs
    #[serde(default = "default_cloud_name")]
    pub name: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_cloud_url")]
    pub base_url: String,

    #[serde(default = "default_cloud_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default credential; a per-request key overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cloud_name() -> String {
    "gemini".into()
}
fn default_cloud_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_cloud_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_timeout_secs() -> u64 {
    120
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            name: default_cloud_name(),
            base_url: default_cloud_url(),
            model: default_cloud_model(),
            temperature: default_temperature(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_url")]
    pub base_url: String,

    #[serde(default = "default_local_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_local_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_local_model() -> String {
    "llama3.2".into()
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_url(),
            model: default_local_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS in addition to same-origin requests.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory of course material read by `pycoach index`
    #[serde(default = "default_course_dir")]
    pub course_dir: PathBuf,

    /// Directory holding the persisted vector index
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Nearest neighbours returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunk window in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_course_dir() -> PathBuf {
    PathBuf::from("course_materials")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("vector_index")
}
fn default_top_k() -> usize {
    5
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            course_dir: default_course_dir(),
            index_dir: default_index_dir(),
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "http" (OpenAI-compatible `/embeddings`) or "local" (Candle, needs the `local` feature)
    #[serde(default = "default_embedding_backend")]
    pub backend: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Texts per embedding call while indexing
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_backend() -> String {
    "http".into()
}
fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".into()
}
fn default_embedding_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_batch_size() -> usize {
    32
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            model: default_embedding_model(),
            url: default_embedding_url(),
            api_key: None,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Passages kept after reranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// "http" (TEI-style `/rerank`) or "local" (Candle, needs the `local` feature)
    #[serde(default = "default_rerank_backend")]
    pub backend: String,

    #[serde(default = "default_rerank_model")]
    pub model: String,

    #[serde(default = "default_rerank_url")]
    pub url: String,
}

fn default_top_n() -> usize {
    5
}
fn default_rerank_backend() -> String {
    "http".into()
}
fn default_rerank_model() -> String {
    "BAAI/bge-reranker-base".into()
}
fn default_rerank_url() -> String {
    "http://localhost:8081".into()
}

/// Cross-encoder loaded by the local backend when the HTTP default is configured.
pub const LOCAL_RERANK_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

impl RerankConfig {
    /// Model for the local backend. `bge-reranker-base` is XLM-RoBERTa,
    /// which the local BERT loader cannot run.
    pub fn local_model(&self) -> &str {
        if self.model == default_rerank_model() {
            LOCAL_RERANK_MODEL
        } else {
            &self.model
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_n: default_top_n(),
            backend: default_rerank_backend(),
            model: default_rerank_model(),
            url: default_rerank_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Token budget before older turns are summarized
    #[serde(default = "default_session_tokens")]
    pub max_tokens: usize,

    /// Live sessions kept before the least recently used one is evicted (0 = unbounded)
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_session_tokens() -> usize {
    8000
}
fn default_max_sessions() -> usize {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_session_tokens(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// "memory" or "file"
    #[serde(default = "default_profiles_backend")]
    pub backend: String,

    /// JSON-lines file used by the "file" backend
    #[serde(default = "default_profiles_path")]
    pub path: PathBuf,
}

fn default_profiles_backend() -> String {
    "memory".into()
}
fn default_profiles_path() -> PathBuf {
    PathBuf::from("profiles.jsonl")
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            backend: default_profiles_backend(),
            path: default_profiles_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (or `pycoach.toml`), then apply
    /// environment overrides:
    /// - `PYCOACH_API_KEY` / `GEMINI_API_KEY` — cloud credential
    /// - `PYCOACH_COURSE_DIR`, `PYCOACH_INDEX_DIR`
    /// - `PYCOACH_LOCAL_URL`, `PYCOACH_EMBEDDING_URL`, `PYCOACH_RERANK_URL`
    /// - `PYCOACH_HOST`, `PYCOACH_PORT`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// The config path used when none is given.
    pub fn default_path() -> PathBuf {
        std::env::var("PYCOACH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("PYCOACH_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")) {
            self.cloud.api_key = Some(key);
        }
        if let Some(dir) = non_empty("PYCOACH_COURSE_DIR") {
            self.retrieval.course_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty("PYCOACH_INDEX_DIR") {
            self.retrieval.index_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty("PYCOACH_LOCAL_URL") {
            self.local.base_url = url;
        }
        if let Some(url) = non_empty("PYCOACH_EMBEDDING_URL") {
            self.retrieval.embedding.url = url;
        }
        if let Some(url) = non_empty("PYCOACH_RERANK_URL") {
            self.rerank.url = url;
        }
        if let Some(host) = non_empty("PYCOACH_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty("PYCOACH_PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("PYCOACH_PORT is not a valid port: {port}"))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, temperature) in [("cloud", self.cloud.temperature), ("local", self.local.temperature)] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "{name}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError("retrieval.top_k must be > 0".into()));
        }

        if self.retrieval.chunk_size == 0 || self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than a non-zero retrieval.chunk_size".into(),
            ));
        }

        if self.retrieval.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.embedding.batch_size must be > 0".into(),
            ));
        }

        if self.rerank.top_n == 0 {
            return Err(ConfigError::ValidationError("rerank.top_n must be > 0".into()));
        }

        for (name, backend) in [
            ("retrieval.embedding.backend", self.retrieval.embedding.backend.as_str()),
            ("rerank.backend", self.rerank.backend.as_str()),
        ] {
            if !matches!(backend, "http" | "local") {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be \"http\" or \"local\", got \"{backend}\""
                )));
            }
        }

        if !matches!(self.profiles.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "profiles.backend must be \"memory\" or \"file\", got \"{}\"",
                self.profiles.backend
            )));
        }

        if self.session.max_tokens == 0 {
            return Err(ConfigError::ValidationError("session.max_tokens must be > 0".into()));
        }

        Ok(())
    }

    /// Check if a default cloud credential is available.
    pub fn has_api_key(&self) -> bool {
        self.cloud.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cloud.model, "gemini-2.5-flash");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
        assert_eq!(config.rerank.top_n, 5);
        assert_eq!(config.session.max_tokens, 8000);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.cloud.base_url, config.cloud.base_url);
        assert_eq!(parsed.retrieval.index_dir, config.retrieval.index_dir);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pycoach.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 8\n\n[session]\nmax_tokens = 2000\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.session.max_tokens, 2000);
        assert_eq!(config.session.max_sessions, 10_000);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.cloud.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn local_rerank_model_defaults_to_bert_cross_encoder() {
        let mut rerank = RerankConfig::default();
        assert_eq!(rerank.local_model(), LOCAL_RERANK_MODEL);
        rerank.model = "cross-encoder/ms-marco-MiniLM-L-12-v2".into();
        assert_eq!(rerank.local_model(), "cross-encoder/ms-marco-MiniLM-L-12-v2");
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.rerank.backend = "onnx".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/pycoach.toml")).unwrap();
        assert_eq!(config.cloud.name, "gemini");
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "g-key"),
            ("PYCOACH_INDEX_DIR", "/data/index"),
            ("PYCOACH_PORT", "9001"),
            ("PYCOACH_LOCAL_URL", ""),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cloud.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.retrieval.index_dir, PathBuf::from("/data/index"));
        assert_eq!(config.gateway.port, 9001);
        // Blank values are ignored
        assert_eq!(config.local.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn pycoach_key_takes_priority() {
        let env: HashMap<&str, &str> =
            HashMap::from([("GEMINI_API_KEY", "g-key"), ("PYCOACH_API_KEY", "p-key")]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.cloud.api_key.as_deref(), Some("p-key"));
    }

    #[test]
    fn bad_port_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|k| (k == "PYCOACH_PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_credentials() {
        let mut config = AppConfig::default();
        config.cloud.api_key = Some("super-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.5-flash"));
        assert!(toml_str.contains("course_materials"));
    }
}
