//! `pycoach index` — Build the vector index from course material.

use pycoach_core::error::RetrievalError;
use pycoach_providers::build_embedder;
use pycoach_retrieval::{TextSplitter, build_index};
use std::path::{Path, PathBuf};
use tracing::error;

pub async fn run(
    config_path: Option<&Path>,
    course_dir: Option<PathBuf>,
    index_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(dir) = course_dir {
        config.retrieval.course_dir = dir;
    }
    if let Some(dir) = index_dir {
        config.retrieval.index_dir = dir;
    }
    let retrieval = &config.retrieval;

    println!("📚 Indexing {}", retrieval.course_dir.display());
    println!(
        "   Chunks:    {} chars, {} overlap",
        retrieval.chunk_size, retrieval.chunk_overlap
    );
    println!(
        "   Embedder:  {} ({})",
        retrieval.embedding.model, retrieval.embedding.backend
    );

    let embedder = build_embedder(&retrieval.embedding).await?;
    let splitter = TextSplitter::new(retrieval.chunk_size, retrieval.chunk_overlap);

    let report = match build_index(
        &retrieval.course_dir,
        &retrieval.index_dir,
        embedder.as_ref(),
        &splitter,
        retrieval.embedding.batch_size,
    )
    .await
    {
        Ok(report) => report,
        Err(e @ RetrievalError::Documents(_)) => {
            println!("\n❌ Directory {} is empty.", retrieval.course_dir.display());
            println!("   Add course material (Markdown, text or .py files) and re-run `pycoach index`.");
            return Err(e.into());
        }
        Err(e) => {
            error!(error = %e, "Indexing failed");
            return Err(e.into());
        }
    };

    println!("\n✅ Index written to {}", report.index_dir.display());
    println!("   Documents: {}", report.documents);
    println!("   Chunks:    {}", report.chunks);
    println!("   Dimension: {} ({})", report.dimension, report.embedding_model);

    Ok(())
}
