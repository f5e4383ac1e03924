//! Retrieval traits — embedding models and cross-encoders.
//!
//! Both are consumed as opaque services: the retrieval crate only needs
//! vectors for texts and relevance scores for (query, passage) pairs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::RetrievalError;

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// The chunk text
    pub content: String,

    /// Source file the chunk came from
    #[serde(default)]
    pub source: String,

    /// Cosine similarity to the query
    #[serde(default)]
    pub similarity: f32,

    /// Cross-encoder relevance (set only after reranking)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>, source: impl Into<String>, similarity: f32) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            similarity,
            relevance_score: None,
        }
    }
}

/// Turns texts into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, recorded in the index manifest.
    fn model(&self) -> &str;

    /// Embed a batch of texts; one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;

    /// Embed a single query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self.embed(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("embedder returned no vector".into()))
    }
}

/// Scores (query, passage) pairs jointly.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    fn model(&self) -> &str;

    /// One score per passage, in input order. Higher is more relevant.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RetrievalError>;
}
