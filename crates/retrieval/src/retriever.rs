//! Query-time retrieval: embed, search, optionally rerank.

use pycoach_core::error::RetrievalError;
use pycoach_core::retrieval::{Embedder, RetrievedPassage};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};
use crate::index::VectorIndex;
use crate::reranker::{NO_DOCUMENTS, Reranker, join_passages};

/// Nearest-neighbour retrieval over a loaded index.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        if index.manifest().embedding_model != embedder.model() {
            warn!(
                index_model = %index.manifest().embedding_model,
                embedder_model = embedder.model(),
                "Index was built with a different embedding model"
            );
        }
        Self { index, embedder, top_k }
    }

    /// The `top_k` passages most similar to `query`, most similar first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let embedding = self.embedder.embed_query(query).await?;
        let dimension = self.index.manifest().dimension;
        if !self.index.is_empty() && embedding.len() != dimension {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "query embedding has dimension {}, index expects {dimension}",
                embedding.len()
            )));
        }

        let passages = self.index.search(&embedding, self.top_k);
        debug!(count = passages.len(), "Retrieved passages");
        Ok(passages)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Context assembled for one question.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    /// Text placed into the prompt
    pub text: String,
    /// Passages behind the text, in prompt order
    pub passages: Vec<RetrievedPassage>,
}

impl RetrievedContext {
    /// Distinct source files, in first-seen order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for p in &self.passages {
            if !p.source.is_empty() && !sources.contains(&p.source) {
                sources.push(p.source.clone());
            }
        }
        sources
    }
}

/// The retrieval subsystem as seen by the tutor.
///
/// Initialized once at startup. If the index or embedder could not be
/// loaded the service stays `Unavailable` for the process lifetime.
pub enum RetrievalService {
    Ready {
        retriever: Retriever,
        reranker: Reranker,
        top_n: usize,
    },
    Unavailable(String),
}

impl RetrievalService {
    pub fn ready(retriever: Retriever, reranker: Reranker, top_n: usize) -> Self {
        Self::Ready { retriever, reranker, top_n }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Load the index at `index_dir` and wire it to the given services.
    pub fn open(
        index_dir: &Path,
        embedder: Result<Arc<dyn Embedder>, RetrievalError>,
        reranker: Reranker,
        top_k: usize,
        top_n: usize,
    ) -> Self {
        let embedder = match embedder {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, "Embedding model failed to load; retrieval disabled");
                return Self::unavailable(e.to_string());
            }
        };

        match VectorIndex::load(index_dir) {
            Ok(index) => Self::ready(Retriever::new(Arc::new(index), embedder, top_k), reranker, top_n),
            Err(e) => {
                error!(
                    path = %index_dir.display(),
                    error = %e,
                    "Vector index failed to load; run `pycoach index` first"
                );
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Why the service is unavailable, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Ready { .. } => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }

    /// Short status label for health reporting.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Ready { reranker, .. } if reranker.is_available() => "ready",
            Self::Ready { .. } => "ready (no reranker)",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// Retrieve, rerank when a reranker is available, and join into context.
    pub async fn context(&self, query: &str) -> Result<RetrievedContext, RetrievalError> {
        let (retriever, reranker, top_n) = match self {
            Self::Ready { retriever, reranker, top_n } => (retriever, reranker, *top_n),
            Self::Unavailable(reason) => return Err(RetrievalError::IndexNotFound(reason.clone())),
        };

        let mut passages = retriever.retrieve(query).await?;

        if reranker.is_available() && !passages.is_empty() {
            passages = match reranker.rank(query, passages.clone(), top_n).await {
                Ok(ranked) => ranked,
                Err(e) => {
                    warn!(error = %e, "Reranking failed; using retrieval order");
                    passages
                }
            };
        }

        let text = if passages.is_empty() {
            NO_DOCUMENTS.to_string()
        } else {
            join_passages(&passages)
        };

        Ok(RetrievedContext { text, passages })
    }
}
