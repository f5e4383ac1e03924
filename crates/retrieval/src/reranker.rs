//! Cross-encoder reranking.
//!
//! Scores each (query, passage) pair jointly and keeps the best `top_n`.
//! Reranking only reorders and truncates; it never adds passages.

use pycoach_core::error::RetrievalError;
use pycoach_core::retrieval::{CrossEncoder, RetrievedPassage};
use std::sync::Arc;
use crate::vector::descending;
use tracing::{info, warn};

/// Returned by [`Reranker::rerank`] when no cross-encoder is loaded.
pub const RERANK_UNAVAILABLE: &str = "Reranking model failed to load. Proceeding with original retrieval.";

/// Returned by [`Reranker::rerank`] when there is nothing to rank.
pub const NO_DOCUMENTS: &str = "No relevant documents found.";

/// Placed between passages in a context string.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Join passage contents into one context string.
pub fn join_passages(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

pub struct Reranker {
    encoder: Option<Arc<dyn CrossEncoder>>,
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>) -> Self {
        Self { encoder: Some(encoder) }
    }

    pub fn unavailable() -> Self {
        Self { encoder: None }
    }

    /// Wrap the outcome of building a cross-encoder, probing it once.
    /// Any failure leaves the reranker unavailable for the process lifetime.
    pub async fn load(encoder: Result<Arc<dyn CrossEncoder>, RetrievalError>) -> Self {
        let encoder = match encoder {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Reranker failed to load; continuing without reranking");
                return Self::unavailable();
            }
        };

        match encoder.score("probe", &["probe".to_string()]).await {
            Ok(_) => {
                info!(model = encoder.model(), "Reranker ready");
                Self::new(encoder)
            }
            Err(e) => {
                warn!(model = encoder.model(), error = %e, "Reranker probe failed; continuing without reranking");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.encoder.as_ref().map(|e| e.model())
    }

    /// Score and reorder `passages`, keeping at most `top_n`.
    ///
    /// Sorting is stable, so equal scores keep their retrieval order.
    pub async fn rank(
        &self,
        query: &str,
        passages: Vec<RetrievedPassage>,
        top_n: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let encoder = self
            .encoder
            .as_ref()
            .ok_or_else(|| RetrievalError::RerankFailed("reranker is unavailable".into()))?;

        if passages.is_empty() {
            return Ok(passages);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let scores = encoder.score(query, &texts).await?;
        if scores.len() != passages.len() {
            return Err(RetrievalError::RerankFailed(format!(
                "expected {} scores, got {}",
                passages.len(),
                scores.len()
            )));
        }

        let mut ranked: Vec<RetrievedPassage> = passages
            .into_iter()
            .zip(scores)
            .map(|(mut p, score)| {
                p.relevance_score = Some(score);
                p
            })
            .collect();

        let score = |p: &RetrievedPassage| p.relevance_score.unwrap_or(f32::NEG_INFINITY);
        ranked.sort_by(|a, b| descending(score(a), score(b)));
        ranked.truncate(top_n.min(ranked.len()));
        Ok(ranked)
    }

    /// Rerank and join into a context string.
    ///
    /// Returns [`RERANK_UNAVAILABLE`] when no cross-encoder is loaded and
    /// [`NO_DOCUMENTS`] for an empty candidate list. If scoring fails the
    /// first `top_n` passages are joined in their original order.
    pub async fn rerank(&self, query: &str, passages: &[RetrievedPassage], top_n: usize) -> String {
        if !self.is_available() {
            return RERANK_UNAVAILABLE.to_string();
        }
        if passages.is_empty() {
            return NO_DOCUMENTS.to_string();
        }

        match self.rank(query, passages.to_vec(), top_n).await {
            Ok(ranked) => join_passages(&ranked),
            Err(e) => {
                warn!(error = %e, "Reranking failed; using retrieval order");
                join_passages(&passages[..top_n.min(passages.len())])
            }
        }
    }
}
