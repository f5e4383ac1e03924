//! Persisted vector index.
//!
//! On-disk layout of an index directory:
//!
//! ```text
//! vector_index/
//!   manifest.json   embedding model, dimension, chunk count, creation time
//!   chunks.jsonl    one {content, source, embedding} object per line
//! ```
//!
//! An index is always written whole into a sibling temporary directory and
//! then swapped into place, so readers never observe a half-written index
//! and a rebuild replaces the previous index entirely.

use chrono::{DateTime, Utc};
use pycoach_core::error::RetrievalError;
use pycoach_core::retrieval::RetrievedPassage;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::vector;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub content: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// An in-memory vector index, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Build an index from embedded chunks. All embeddings must share one
    /// dimension.
    pub fn new(embedding_model: impl Into<String>, chunks: Vec<IndexedChunk>) -> Result<Self, RetrievalError> {
        let dimension = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        if let Some(bad) = chunks.iter().position(|c| c.embedding.len() != dimension) {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "chunk {bad} has dimension {}, expected {dimension}",
                chunks[bad].embedding.len()
            )));
        }

        Ok(Self {
            manifest: IndexManifest {
                embedding_model: embedding_model.into(),
                dimension,
                chunk_count: chunks.len(),
                created_at: Utc::now(),
            },
            chunks,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` chunks most similar to `query`, by descending cosine similarity.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<RetrievedPassage> {
        vector::top_k(self.chunks.iter().map(|c| c.embedding.as_slice()), query, k)
            .into_iter()
            .map(|(i, similarity)| {
                let chunk = &self.chunks[i];
                RetrievedPassage::new(chunk.content.clone(), chunk.source.clone(), similarity)
            })
            .collect()
    }

    /// Read an index directory.
    pub fn load(dir: &Path) -> Result<Self, RetrievalError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(RetrievalError::IndexNotFound(dir.display().to_string()));
        }

        let raw = std::fs::read_to_string(&manifest_path)
            .map_err(|e| RetrievalError::Io(format!("Failed to read manifest: {e}")))?;
        let manifest: IndexManifest = serde_json::from_str(&raw)
            .map_err(|e| RetrievalError::IndexCorrupt(format!("Invalid manifest: {e}")))?;

        let file = std::fs::File::open(dir.join(CHUNKS_FILE))
            .map_err(|e| RetrievalError::IndexCorrupt(format!("Failed to open chunk file: {e}")))?;

        let mut chunks = Vec::with_capacity(manifest.chunk_count);
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| RetrievalError::Io(format!("Failed to read chunk file: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: IndexedChunk = serde_json::from_str(&line)
                .map_err(|e| RetrievalError::IndexCorrupt(format!("line {}: {e}", n + 1)))?;
            if chunk.embedding.len() != manifest.dimension {
                return Err(RetrievalError::IndexCorrupt(format!(
                    "line {} has dimension {}, manifest says {}",
                    n + 1,
                    chunk.embedding.len(),
                    manifest.dimension
                )));
            }
            chunks.push(chunk);
        }

        if chunks.len() != manifest.chunk_count {
            return Err(RetrievalError::IndexCorrupt(format!(
                "manifest lists {} chunks, found {}",
                manifest.chunk_count,
                chunks.len()
            )));
        }

        info!(
            path = %dir.display(),
            chunks = chunks.len(),
            model = %manifest.embedding_model,
            "Vector index loaded"
        );

        Ok(Self { manifest, chunks })
    }

    /// Write the index to `dir`, replacing whatever was there.
    pub fn persist(&self, dir: &Path) -> Result<(), RetrievalError> {
        let io = |what: &str, e: std::io::Error| RetrievalError::Io(format!("{what}: {e}"));

        let staging = sibling(dir, "staging");
        let retired = sibling(dir, "old");
        for stale in [&staging, &retired] {
            if stale.exists() {
                std::fs::remove_dir_all(stale).map_err(|e| io("Failed to clear stale directory", e))?;
            }
        }

        std::fs::create_dir_all(&staging).map_err(|e| io("Failed to create staging directory", e))?;
        self.write_files(&staging)?;

        swap_into_place(&staging, dir, &retired)?;

        info!(path = %dir.display(), chunks = self.chunks.len(), "Vector index persisted");
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> Result<(), RetrievalError> {
        let io = |what: &str, e: std::io::Error| RetrievalError::Io(format!("{what}: {e}"));

        let manifest = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| RetrievalError::Io(format!("Failed to serialize manifest: {e}")))?;
        std::fs::write(dir.join(MANIFEST_FILE), manifest).map_err(|e| io("Failed to write manifest", e))?;

        let file = std::fs::File::create(dir.join(CHUNKS_FILE)).map_err(|e| io("Failed to create chunk file", e))?;
        let mut writer = BufWriter::new(file);
        for chunk in &self.chunks {
            serde_json::to_writer(&mut writer, chunk)
                .map_err(|e| RetrievalError::Io(format!("Failed to serialize chunk: {e}")))?;
            writer.write_all(b"\n").map_err(|e| io("Failed to write chunk", e))?;
        }
        writer.flush().map_err(|e| io("Failed to flush chunk file", e))
    }
}

/// Move `staging` to `dir`. A previous index is set aside at `retired`
/// and put back if the new one cannot be moved in.
fn swap_into_place(staging: &Path, dir: &Path, retired: &Path) -> Result<(), RetrievalError> {
    let io = |what: &str, e: std::io::Error| RetrievalError::Io(format!("{what}: {e}"));

    let replacing = dir.exists();
    if replacing {
        debug!(path = %dir.display(), "Replacing previous index");
        std::fs::rename(dir, retired).map_err(|e| io("Failed to move old index aside", e))?;
    }

    if let Err(e) = std::fs::rename(staging, dir) {
        if replacing {
            if let Err(restore) = std::fs::rename(retired, dir) {
                warn!(path = %retired.display(), error = %restore, "Failed to restore previous index");
            }
        }
        return Err(io("Failed to move new index into place", e));
    }

    if replacing {
        std::fs::remove_dir_all(retired).map_err(|e| io("Failed to remove old index", e))?;
    }
    Ok(())
}

/// `<parent>/<name>.<suffix>` next to `dir`.
fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    dir.with_file_name(format!("{name}.{suffix}"))
}
