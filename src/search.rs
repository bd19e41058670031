//! The `search` command: retrieval-only queries against the index.
//!
//! Debug surface for inspecting what the answerer would be grounded on; no
//! rewriting, no generation, no session writes.

use anyhow::Result;

use crate::config::Config;
use crate::embedding;
use crate::index::VectorIndex;

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let embedder = embedding::create_provider(&config.embedding)?;
    let index = VectorIndex::open(&config.index.path, embedder)
        .await?
        .with_batch_size(config.embedding.batch_size);

    let k = limit.unwrap_or(config.retrieval.top_k);
    let hits = index.search(query, k).await?;

    if hits.is_empty() {
        println!("No results.");
        index.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (page {})",
            i + 1,
            hit.score,
            hit.chunk.source,
            hit.chunk.page
        );
        let snippet: String = hit.chunk.text.chars().take(160).collect();
        println!("    excerpt: \"{}\"", snippet.replace('\n', " ").trim());
        println!();
    }

    index.close().await;
    Ok(())
}
