//! HTTP cross-encoder client.
//!
//! Talks to a Text Embeddings Inference style `/rerank` endpoint serving a
//! cross-encoder such as `BAAI/bge-reranker-base`.

use async_trait::async_trait;
use pycoach_core::error::RetrievalError;
use pycoach_core::retrieval::CrossEncoder;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct HttpCrossEncoder {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpCrossEncoder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RankedItem {
    index: usize,
    score: f32,
}

/// Place server-ranked scores back into input order.
fn scores_in_input_order(items: Vec<RankedItem>, len: usize) -> Result<Vec<f32>, RetrievalError> {
    let mut scores = vec![None; len];
    for item in items {
        let slot = scores.get_mut(item.index).ok_or_else(|| {
            RetrievalError::RerankFailed(format!("score index {} out of range", item.index))
        })?;
        *slot = Some(item.score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| RetrievalError::RerankFailed(format!("no score for passage {i}"))))
        .collect()
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RetrievalError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rerank", self.base_url);
        let body = serde_json::json!({
            "query": query,
            "texts": passages,
            "truncate": true,
        });

        debug!(model = %self.model, count = passages.len(), "Sending rerank request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::RerankFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::RerankFailed(format!("status {status}: {body}")));
        }

        let items: Vec<RankedItem> = response
            .json()
            .await
            .map_err(|e| RetrievalError::RerankFailed(format!("Failed to parse rerank response: {e}")))?;

        scores_in_input_order(items, passages.len())
    }
}
