//! Offline indexing: load course material, chunk, embed, persist.

use pycoach_core::error::RetrievalError;
use pycoach_core::retrieval::Embedder;
use std::path::{Path, PathBuf};
use tracing::info;
use crate::chunker::TextSplitter;
use crate::index::{IndexedChunk, VectorIndex};
use crate::loader::load_documents;
use crate::vector::normalize;

/// Summary of a completed indexing run.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub index_dir: PathBuf,
}

/// Build a fresh index from `course_dir` and write it to `index_dir`,
/// replacing any previous index.
pub async fn build_index(
    course_dir: &Path,
    index_dir: &Path,
    embedder: &dyn Embedder,
    splitter: &TextSplitter,
    batch_size: usize,
) -> Result<IndexReport, RetrievalError> {
    info!(path = %course_dir.display(), "Loading documents");
    let documents = load_documents(course_dir)?;

    let pieces: Vec<(String, String)> = documents
        .iter()
        .flat_map(|doc| {
            splitter
                .split(&doc.content)
                .into_iter()
                .map(|chunk| (chunk, doc.source.clone()))
        })
        .collect();

    if pieces.is_empty() {
        return Err(RetrievalError::Documents(format!(
            "directory '{}' is empty; no text to index",
            course_dir.display()
        )));
    }

    info!(
        documents = documents.len(),
        chunks = pieces.len(),
        model = embedder.model(),
        "Embedding chunks"
    );

    let mut chunks = Vec::with_capacity(pieces.len());
    for (n, batch) in pieces.chunks(batch_size.max(1)).enumerate() {
        let texts: Vec<String> = batch.iter().map(|(text, _)| text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "batch {n}: expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        for ((content, source), mut embedding) in batch.iter().cloned().zip(vectors) {
            normalize(&mut embedding);
            chunks.push(IndexedChunk { content, source, embedding });
        }
    }

    let index = VectorIndex::new(embedder.model(), chunks)?;
    index.persist(index_dir)?;

    Ok(IndexReport {
        documents: documents.len(),
        chunks: index.len(),
        dimension: index.manifest().dimension,
        embedding_model: index.manifest().embedding_model.clone(),
        index_dir: index_dir.to_path_buf(),
    })
}
