//! Backend router — resolves which language model serves a request.
//!
//! The cloud backend needs a credential, which may arrive with each request,
//! so it is produced per request by a factory. The local backend is shared.
//! Also builds the embedding and cross-encoder services from configuration.

use pycoach_config::{AppConfig, EmbeddingConfig, RerankConfig};
use pycoach_core::error::RetrievalError;
use pycoach_core::level::BackendSelector;
use pycoach_core::provider::Provider;
use pycoach_core::retrieval::{CrossEncoder, Embedder};
use std::sync::Arc;
use tracing::debug;
use crate::openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};
use crate::rerank::HttpCrossEncoder;

/// Builds a cloud provider for a given credential.
pub type CloudFactory = Arc<dyn Fn(&str) -> Arc<dyn Provider> + Send + Sync>;

/// A backend resolved for one request.
#[derive(Clone)]
pub struct Backend {
    pub selector: BackendSelector,
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
}

/// Routes requests to the cloud or local language model.
pub struct BackendRouter {
    cloud: CloudFactory,
    cloud_key: Option<String>,
    cloud_model: String,
    cloud_temperature: f32,
    local: Arc<dyn Provider>,
    local_model: String,
    local_temperature: f32,
}

impl BackendRouter {
    /// Create a router from a cloud factory and a local provider.
    pub fn new(cloud: CloudFactory, local: Arc<dyn Provider>) -> Self {
        Self {
            cloud,
            cloud_key: None,
            cloud_model: "gemini-2.5-flash".into(),
            cloud_temperature: 0.3,
            local,
            local_model: "llama3.2".into(),
            local_temperature: 0.3,
        }
    }

    /// Set the fallback cloud credential (environment or config file).
    pub fn with_cloud_key(mut self, key: Option<String>) -> Self {
        self.cloud_key = key;
        self
    }

    pub fn with_cloud_model(mut self, model: impl Into<String>, temperature: f32) -> Self {
        self.cloud_model = model.into();
        self.cloud_temperature = temperature;
        self
    }

    pub fn with_local_model(mut self, model: impl Into<String>, temperature: f32) -> Self {
        self.local_model = model.into();
        self.local_temperature = temperature;
        self
    }

    /// Build the router described by the `cloud` and `local` config sections.
    pub fn from_config(config: &AppConfig) -> Self {
        let template = OpenAiCompatProvider::with_timeout(
            config.cloud.name.clone(),
            config.cloud.base_url.clone(),
            "",
            config.cloud.timeout_secs,
        );
        let cloud: CloudFactory = Arc::new(move |key: &str| {
            Arc::new(template.with_api_key(key)) as Arc<dyn Provider>
        });

        let local = Arc::new(OpenAiCompatProvider::with_timeout(
            "ollama",
            config.local.base_url.clone(),
            "ollama",
            config.local.timeout_secs,
        ));

        Self::new(cloud, local)
            .with_cloud_key(config.cloud.api_key.clone())
            .with_cloud_model(config.cloud.model.clone(), config.cloud.temperature)
            .with_local_model(config.local.model.clone(), config.local.temperature)
    }

    /// Resolve the cloud backend. The request credential wins over the
    /// configured one; blank keys count as absent. `None` when neither exists.
    pub fn cloud(&self, request_key: Option<&str>) -> Option<Backend> {
        let key = request_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| self.cloud_key.as_deref().map(str::trim).filter(|k| !k.is_empty()))?;

        debug!(from_request = request_key.is_some_and(|k| !k.trim().is_empty()), "Resolved cloud credential");

        Some(Backend {
            selector: BackendSelector::Cloud,
            provider: (self.cloud)(key),
            model: self.cloud_model.clone(),
            temperature: self.cloud_temperature,
        })
    }

    /// The local backend (no credential).
    pub fn local(&self) -> Backend {
        Backend {
            selector: BackendSelector::Local,
            provider: self.local.clone(),
            model: self.local_model.clone(),
            temperature: self.local_temperature,
        }
    }

    /// Whether a fallback cloud credential is configured.
    pub fn has_cloud_key(&self) -> bool {
        self.cloud_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(not(feature = "local"))]
fn local_feature_missing(what: &str) -> RetrievalError {
    RetrievalError::ModelLoad(format!(
        "{what} backend \"local\" requires building with the `local` feature"
    ))
}

/// Build the embedding service described by `retrieval.embedding`.
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, RetrievalError> {
    match config.backend.as_str() {
        "local" => {
            #[cfg(feature = "local")]
            {
                let model = config.model.clone();
                let embedder = tokio::task::spawn_blocking(move || crate::local::BertEmbedder::load(&model))
                    .await
                    .map_err(|e| RetrievalError::ModelLoad(format!("Model loading task failed: {e}")))??;
                Ok(Arc::new(embedder))
            }
            #[cfg(not(feature = "local"))]
            {
                Err(local_feature_missing("embedding"))
            }
        }
        _ => Ok(Arc::new(OpenAiCompatEmbedder::new(
            config.url.clone(),
            config.model.clone(),
            config.api_key.clone(),
        ))),
    }
}

/// Build the cross-encoder described by `rerank`.
pub async fn build_cross_encoder(config: &RerankConfig) -> Result<Arc<dyn CrossEncoder>, RetrievalError> {
    match config.backend.as_str() {
        "local" => {
            #[cfg(feature = "local")]
            {
                let model = config.local_model().to_string();
                let encoder = tokio::task::spawn_blocking(move || crate::local::BertCrossEncoder::load(&model))
                    .await
                    .map_err(|e| RetrievalError::ModelLoad(format!("Model loading task failed: {e}")))??;
                Ok(Arc::new(encoder))
            }
            #[cfg(not(feature = "local"))]
            {
                Err(local_feature_missing("rerank"))
            }
        }
        _ => Ok(Arc::new(HttpCrossEncoder::new(config.url.clone(), config.model.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pycoach_core::error::ProviderError;
    use pycoach_core::provider::{ProviderRequest, ProviderResponse};
    use pycoach_core::Message;

    struct Named(String);

    #[async_trait]
    impl Provider for Named {
        fn name(&self) -> &str {
            &self.0
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(self.0.clone()),
                usage: None,
                model: request.model,
            })
        }
    }

    fn router() -> BackendRouter {
        let cloud: CloudFactory = Arc::new(|key: &str| Arc::new(Named(format!("cloud:{key}"))) as Arc<dyn Provider>);
        BackendRouter::new(cloud, Arc::new(Named("local".into())))
    }

    #[test]
    fn request_key_wins() {
        let router = router().with_cloud_key(Some("env-key".into()));
        let backend = router.cloud(Some("req-key")).unwrap();
        assert_eq!(backend.provider.name(), "cloud:req-key");
        assert_eq!(backend.selector, BackendSelector::Cloud);
    }

    #[test]
    fn blank_request_key_falls_back_to_config() {
        let router = router().with_cloud_key(Some("env-key".into()));
        let backend = router.cloud(Some("   ")).unwrap();
        assert_eq!(backend.provider.name(), "cloud:env-key");
    }

    #[test]
    fn no_key_anywhere_is_none() {
        assert!(router().cloud(None).is_none());
        assert!(router().with_cloud_key(Some("".into())).cloud(Some("")).is_none());
    }

    #[test]
    fn local_needs_no_key() {
        let backend = router().with_local_model("qwen2.5", 0.1).local();
        assert_eq!(backend.provider.name(), "local");
        assert_eq!(backend.model, "qwen2.5");
        assert_eq!(backend.selector, BackendSelector::Local);
    }

    #[test]
    fn from_default_config() {
        let mut config = AppConfig::default();
        config.cloud.api_key = Some("k".into());
        let router = BackendRouter::from_config(&config);
        assert!(router.has_cloud_key());
        let backend = router.cloud(None).unwrap();
        assert_eq!(backend.provider.name(), "gemini");
        assert_eq!(backend.model, "gemini-2.5-flash");
        assert_eq!(router.local().provider.name(), "ollama");
    }

    #[tokio::test]
    async fn http_backends_build_without_network() {
        let config = AppConfig::default();
        let embedder = build_embedder(&config.retrieval.embedding).await.unwrap();
        assert_eq!(embedder.model(), "BAAI/bge-small-en-v1.5");
        let encoder = build_cross_encoder(&config.rerank).await.unwrap();
        assert_eq!(encoder.model(), "BAAI/bge-reranker-base");
    }

    #[cfg(not(feature = "local"))]
    #[tokio::test]
    async fn local_backend_without_feature_fails() {
        let mut config = AppConfig::default();
        config.rerank.backend = "local".into();
        assert!(build_cross_encoder(&config.rerank).await.is_err());
    }
}
