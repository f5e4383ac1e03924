//! `pycoach doctor` — Diagnose configuration, index and backends.

use pycoach_core::provider::Provider;
use pycoach_core::retrieval::Embedder;
use pycoach_providers::{BackendRouter, build_cross_encoder, build_embedder};
use pycoach_retrieval::{Reranker, VectorIndex};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 PyCoach Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ Cloud API key configured");
    } else {
        println!("  ⚠️  No cloud API key — set GEMINI_API_KEY or send one per request");
        issues += 1;
    }

    let course_dir = &config.retrieval.course_dir;
    if course_dir.is_dir() {
        println!("  ✅ Course directory exists: {}", course_dir.display());
    } else {
        println!("  ❌ No course directory at {} — run `pycoach init`", course_dir.display());
        issues += 1;
    }

    let index = match VectorIndex::load(&config.retrieval.index_dir) {
        Ok(index) => {
            let manifest = index.manifest();
            println!(
                "  ✅ Vector index: {} chunks, dimension {}, built {}",
                manifest.chunk_count,
                manifest.dimension,
                manifest.created_at.format("%Y-%m-%d %H:%M UTC")
            );
            Some(index)
        }
        Err(e) => {
            println!("  ❌ Vector index unusable: {e} — run `pycoach index`");
            issues += 1;
            None
        }
    };

    match build_embedder(&config.retrieval.embedding).await {
        Ok(embedder) => match embedder.embed_query("probe").await {
            Ok(vector) => {
                println!("  ✅ Embedder {} answers ({} dims)", embedder.model(), vector.len());
                if let Some(index) = &index {
                    if index.manifest().dimension != vector.len() {
                        println!("  ❌ Index dimension does not match the embedder — re-run `pycoach index`");
                        issues += 1;
                    }
                }
            }
            Err(e) => {
                println!("  ❌ Embedder unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Embedder failed to load: {e}");
            issues += 1;
        }
    }

    if config.rerank.enabled {
        let reranker = Reranker::load(build_cross_encoder(&config.rerank).await).await;
        match reranker.model() {
            Some(model) => println!("  ✅ Reranker {model} ready"),
            None => {
                println!("  ⚠️  Reranker unavailable — answers use similarity order");
                issues += 1;
            }
        }
    } else {
        println!("  ℹ️  Reranking disabled");
    }

    let local = BackendRouter::from_config(&config).local();
    match local.provider.health_check().await {
        Ok(true) => println!("  ✅ Local model service reachable at {}", config.local.base_url),
        _ => println!("  ℹ️  Local model service not reachable at {} (only needed for local mode)", config.local.base_url),
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
