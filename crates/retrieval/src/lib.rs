//! Retrieval for PyCoach.
//!
//! Offline, `pycoach index` loads the course directory, splits it into
//! overlapping chunks, embeds them and persists a [`VectorIndex`]. Online,
//! the [`RetrievalService`] embeds each question, runs an exhaustive cosine
//! search over the loaded index and, when a cross-encoder is available,
//! reranks the hits before they are joined into prompt context.

pub mod chunker;
pub mod index;
pub mod indexer;
pub mod loader;
pub mod reranker;
pub mod retriever;
pub mod vector;

pub use chunker::TextSplitter;
pub use index::{IndexManifest, IndexedChunk, VectorIndex};
pub use indexer::{IndexReport, build_index};
pub use loader::{Document, load_documents};
pub use reranker::{NO_DOCUMENTS, PASSAGE_SEPARATOR, RERANK_UNAVAILABLE, Reranker, join_passages};
pub use retriever::{RetrievalService, RetrievedContext, Retriever};
pub use vector::cosine_similarity;
