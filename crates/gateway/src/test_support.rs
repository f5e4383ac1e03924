//! Mocks shared by the gateway tests.

use pycoach_core::error::{ProviderError, RetrievalError};
use pycoach_core::message::Message;
use pycoach_core::provider::{Provider, ProviderRequest, ProviderResponse};
use pycoach_core::retrieval::Embedder;
use pycoach_memory::{InMemoryProfileStore, SessionStore};
use pycoach_providers::{BackendRouter, CloudFactory};
use pycoach_retrieval::{IndexedChunk, RetrievalService, Reranker, Retriever, VectorIndex};
use pycoach_tutor::Tutor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lightweight mock provider: every call gets the same outcome.
pub struct MockProvider {
    outcome: Result<String, ProviderError>,
    pub calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn reply(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail(error: ProviderError) -> Self {
        Self {
            outcome: Err(error),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "gateway_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.outcome.clone()?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "mock-model".into(),
        })
    }
}

struct KeywordEmbedder;

#[async_trait::async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

fn keyword_vector(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    ["list", "loop"]
        .iter()
        .map(|k| if text.contains(k) { 1.0 } else { 0.01 })
        .collect()
}

pub fn ready_retrieval() -> RetrievalService {
    let chunk = |content: &str, source: &str| IndexedChunk {
        content: content.into(),
        source: source.into(),
        embedding: keyword_vector(content),
    };
    let index = VectorIndex::new(
        "keyword",
        vec![
            chunk("A list is an ordered collection.", "lists.md"),
            chunk("A loop repeats a block.", "loops.md"),
        ],
    )
    .unwrap();

    RetrievalService::ready(
        Retriever::new(Arc::new(index), Arc::new(KeywordEmbedder), 2),
        Reranker::unavailable(),
        5,
    )
}

/// A tutor whose cloud and local backends are both `provider`.
pub fn test_tutor(provider: MockProvider, retrieval: RetrievalService, cloud_key: Option<&str>) -> Tutor {
    let provider: Arc<dyn Provider> = Arc::new(provider);
    let cloud_provider = provider.clone();
    let factory: CloudFactory = Arc::new(move |_key: &str| cloud_provider.clone());
    let router = BackendRouter::new(factory, provider).with_cloud_key(cloud_key.map(String::from));

    Tutor::new(
        Arc::new(InMemoryProfileStore::new()),
        Arc::new(SessionStore::new(8000, 0)),
        Arc::new(retrieval),
        router,
    )
}
