//! Shared test helpers for tutor tests.

use pycoach_core::error::{ProviderError, RetrievalError};
use pycoach_core::message::Message;
use pycoach_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use pycoach_core::retrieval::Embedder;
use pycoach_memory::{InMemoryProfileStore, SessionStore};
use pycoach_providers::{BackendRouter, CloudFactory};
use pycoach_retrieval::{IndexedChunk, RetrievalService, Reranker, Retriever, VectorIndex};
use std::sync::{Arc, Mutex};
use crate::tutor::Tutor;

/// A mock provider that replays scripted outcomes and records requests.
///
/// Each call to `complete` returns the next outcome in the queue.
/// Panics if more calls are made than outcomes provided.
pub struct ScriptedProvider {
    outcomes: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    healthy: bool,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// System prompt of the `n`th request.
    pub fn system_prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n].messages[0].content.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut outcomes = self.outcomes.lock().unwrap();

        if outcomes.is_empty() {
            panic!("ScriptedProvider: no more outcomes (call #{})", requests.len());
        }

        requests.push(request);
        outcomes.remove(0)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(self.healthy)
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Embeds by keyword presence: [list, loop, dict].
pub struct KeywordEmbedder;

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
    ["list", "loop", "dict"]
        .iter()
        .map(|k| if text.contains(k) { 1.0 } else { 0.01 })
        .collect()
}

/// A ready retrieval service over three short course passages.
pub fn ready_retrieval() -> RetrievalService {
    let chunk = |content: &str, source: &str| IndexedChunk {
        content: content.into(),
        source: source.into(),
        embedding: keyword_vector(content),
    };
    let index = VectorIndex::new(
        "keyword",
        vec![
            chunk("A list is an ordered, mutable collection.", "lists.md"),
            chunk("A for loop repeats a block for each item.", "loops.md"),
            chunk("A dict maps keys to values.", "dicts.md"),
        ],
    )
    .unwrap();

    RetrievalService::ready(
        Retriever::new(Arc::new(index), Arc::new(KeywordEmbedder), 2),
        Reranker::unavailable(),
        5,
    )
}

/// Cloud credentials the router handed to its factory.
pub type SeenKeys = Arc<Mutex<Vec<String>>>;

/// A router whose cloud and local backends are the given mocks.
pub fn router(
    cloud: Arc<ScriptedProvider>,
    local: Arc<ScriptedProvider>,
    cloud_key: Option<&str>,
) -> (BackendRouter, SeenKeys) {
    let seen: SeenKeys = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let factory: CloudFactory = Arc::new(move |key: &str| {
        recorder.lock().unwrap().push(key.to_string());
        cloud.clone() as Arc<dyn Provider>
    });

    let router = BackendRouter::new(factory, local).with_cloud_key(cloud_key.map(String::from));
    (router, seen)
}

/// A tutor with in-memory stores, the given retrieval service, and a cloud
/// key configured.
pub fn tutor(cloud: Arc<ScriptedProvider>, retrieval: RetrievalService) -> Tutor {
    let local = Arc::new(ScriptedProvider::new(vec![]));
    let (router, _) = router(cloud, local, Some("env-key"));
    Tutor::new(
        Arc::new(InMemoryProfileStore::new()),
        Arc::new(SessionStore::new(8000, 100)),
        Arc::new(retrieval),
        router,
    )
}
