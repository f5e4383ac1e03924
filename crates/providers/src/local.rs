//! Local embedding and cross-encoder models — run directly on your hardware.
//!
//! Uses [Candle](https://github.com/huggingface/candle) to run BERT-family
//! encoders on the CPU. Weights and tokenizers are fetched from the
//! HuggingFace Hub on first load and cached by `hf-hub`.
//!
//! - [`BertEmbedder`]: CLS pooling followed by L2 normalization
//!   (`BAAI/bge-small-en-v1.5` and friends).
//! - [`BertCrossEncoder`]: sequence-classification head over (query, passage)
//!   pairs with a sigmoid on the single logit
//!   (`cross-encoder/ms-marco-MiniLM-L-6-v2` and friends).

use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::api::sync::Api;
use pycoach_core::error::RetrievalError;
use pycoach_core::retrieval::{CrossEncoder, Embedder};
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::{EncodeInput, Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::info;

/// Longest input the BERT position embeddings accept.
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Files fetched for a model repo.
struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

fn fetch(model_id: &str) -> Result<ModelFiles, RetrievalError> {
    info!(model = model_id, "Downloading/loading local encoder");

    let api = Api::new().map_err(|e| {
        RetrievalError::ModelLoad(format!("Failed to initialize HuggingFace Hub API: {e}"))
    })?;
    let repo = api.model(model_id.to_string());

    let get = |file: &str| {
        repo.get(file).map_err(|e| {
            RetrievalError::ModelLoad(format!("Failed to download '{file}' from '{model_id}': {e}"))
        })
    };

    Ok(ModelFiles {
        config: get("config.json")?,
        tokenizer: get("tokenizer.json")?,
        weights: get("model.safetensors")?,
    })
}

fn load_tokenizer(path: &PathBuf) -> Result<Tokenizer, RetrievalError> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| RetrievalError::ModelLoad(format!("Failed to load tokenizer: {e}")))?;

    tokenizer.with_padding(Some(PaddingParams::default()));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| RetrievalError::ModelLoad(format!("Failed to configure truncation: {e}")))?;

    Ok(tokenizer)
}

fn load_config(path: &PathBuf) -> Result<Config, RetrievalError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RetrievalError::ModelLoad(format!("Failed to read model config: {e}")))?;
    serde_json::from_str(&raw)
        .map_err(|e| RetrievalError::ModelLoad(format!("Failed to parse model config: {e}")))
}

fn load_weights(path: &PathBuf, device: &Device) -> Result<VarBuilder<'static>, RetrievalError> {
    let bytes = std::fs::read(path)
        .map_err(|e| RetrievalError::ModelLoad(format!("Failed to read model weights: {e}")))?;
    VarBuilder::from_buffered_safetensors(bytes, DTYPE, device)
        .map_err(|e| RetrievalError::ModelLoad(format!("Failed to load model weights: {e}")))
}

/// Stack per-encoding id rows into `[batch, seq]` tensors.
fn batch_tensors(encodings: &[Encoding], device: &Device) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
    let mut ids = Vec::with_capacity(encodings.len());
    let mut types = Vec::with_capacity(encodings.len());
    let mut masks = Vec::with_capacity(encodings.len());

    for enc in encodings {
        ids.push(Tensor::new(enc.get_ids(), device)?);
        types.push(Tensor::new(enc.get_type_ids(), device)?);
        masks.push(Tensor::new(enc.get_attention_mask(), device)?);
    }

    Ok((
        Tensor::stack(&ids, 0)?,
        Tensor::stack(&types, 0)?,
        Tensor::stack(&masks, 0)?,
    ))
}

// ── Embedder ───────────────────────────────────────────────────────────

struct EmbedderState {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl EmbedderState {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let failed = |e: candle_core::Error| RetrievalError::EmbeddingFailed(format!("Candle inference error: {e}"));

        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("Tokenization failed: {e}")))?;

        let (ids, types, mask) = batch_tensors(&encodings, &self.device).map_err(failed)?;
        let hidden = self.model.forward(&ids, &types, Some(&mask)).map_err(failed)?;

        // CLS pooling, then L2 normalization
        let cls = hidden.i((.., 0)).map_err(failed)?;
        let norm = cls
            .sqr()
            .and_then(|s| s.sum_keepdim(1))
            .and_then(|s| s.sqrt())
            .map_err(failed)?;
        let normalized = cls.broadcast_div(&norm).map_err(failed)?;

        normalized.to_dtype(DType::F32).and_then(|t| t.to_vec2::<f32>()).map_err(failed)
    }
}

/// A BERT sentence embedder running locally through Candle.
pub struct BertEmbedder {
    model_id: String,
    state: Arc<EmbedderState>,
}

impl BertEmbedder {
    /// Download (if needed) and load the model. Blocking; call from
    /// `spawn_blocking` inside async code.
    pub fn load(model_id: &str) -> Result<Self, RetrievalError> {
        let device = Device::Cpu;
        let files = fetch(model_id)?;
        let config = load_config(&files.config)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;
        let vb = load_weights(&files.weights, &device)?;

        let model = BertModel::load(vb, &config)
            .map_err(|e| RetrievalError::ModelLoad(format!("Failed to build BERT model: {e}")))?;

        info!(model = model_id, "Local embedder ready");

        Ok(Self {
            model_id: model_id.to_string(),
            state: Arc::new(EmbedderState { model, tokenizer, device }),
        })
    }
}

#[async_trait]
impl Embedder for BertEmbedder {
    fn model(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Candle is CPU-bound
        let state = self.state.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || state.embed(texts))
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("Embedding task panicked: {e}")))?
    }
}

// ── Cross-encoder ──────────────────────────────────────────────────────

struct CrossEncoderState {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl CrossEncoderState {
    fn score(&self, query: String, passages: Vec<String>) -> Result<Vec<f32>, RetrievalError> {
        let failed = |e: candle_core::Error| RetrievalError::RerankFailed(format!("Candle inference error: {e}"));

        let pairs: Vec<EncodeInput> = passages
            .into_iter()
            .map(|p| (query.clone(), p).into())
            .collect();

        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| RetrievalError::RerankFailed(format!("Tokenization failed: {e}")))?;

        let (ids, types, mask) = batch_tensors(&encodings, &self.device).map_err(failed)?;
        let hidden = self.bert.forward(&ids, &types, Some(&mask)).map_err(failed)?;

        let cls = hidden.i((.., 0)).map_err(failed)?;
        let pooled = self.pooler.forward(&cls).and_then(|t| t.tanh()).map_err(failed)?;
        let logits = self
            .classifier
            .forward(&pooled)
            .and_then(|t| t.squeeze(1))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(failed)?;

        Ok(logits.into_iter().map(|x| 1.0 / (1.0 + (-x).exp())).collect())
    }
}

/// A BERT sequence-classification cross-encoder running locally through Candle.
pub struct BertCrossEncoder {
    model_id: String,
    state: Arc<CrossEncoderState>,
}

impl BertCrossEncoder {
    /// Download (if needed) and load the model. Blocking.
    pub fn load(model_id: &str) -> Result<Self, RetrievalError> {
        let device = Device::Cpu;
        let files = fetch(model_id)?;
        let config = load_config(&files.config)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;
        let vb = load_weights(&files.weights, &device)?;

        let load_err = |e: candle_core::Error| RetrievalError::ModelLoad(format!("Failed to build cross-encoder: {e}"));

        let bert = BertModel::load(vb.pp("bert"), &config).map_err(load_err)?;
        let pooler = candle_nn::linear(config.hidden_size, config.hidden_size, vb.pp("bert.pooler.dense"))
            .map_err(load_err)?;
        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier")).map_err(load_err)?;

        info!(model = model_id, "Local cross-encoder ready");

        Ok(Self {
            model_id: model_id.to_string(),
            state: Arc::new(CrossEncoderState {
                bert,
                pooler,
                classifier,
                tokenizer,
                device,
            }),
        })
    }
}

#[async_trait]
impl CrossEncoder for BertCrossEncoder {
    fn model(&self) -> &str {
        &self.model_id
    }

    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RetrievalError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.clone();
        let query = query.to_string();
        let passages = passages.to_vec();
        tokio::task::spawn_blocking(move || state.score(query, passages))
            .await
            .map_err(|e| RetrievalError::RerankFailed(format!("Rerank task panicked: {e}")))?
    }
}
