//! Backend implementations for PyCoach.
//!
//! Language models implement `pycoach_core::Provider`; embedding models and
//! cross-encoders implement `pycoach_core::Embedder` / `CrossEncoder`.
//! The router resolves which language model serves a request.

#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod rerank;
pub mod router;

#[cfg(feature = "local")]
pub use local::{BertCrossEncoder, BertEmbedder};
pub use openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};
pub use rerank::HttpCrossEncoder;
pub use router::{Backend, BackendRouter, CloudFactory, build_cross_encoder, build_embedder};
