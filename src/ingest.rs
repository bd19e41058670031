//! Document ingestion command.
//!
//! Resolves the given paths (directories are walked), extracts per-page text
//! from each supported file, chunks it, and writes (embedding, chunk) pairs
//! into the vector index. Extraction failures skip the file with a warning;
//! embedding failures abort the run without touching previously persisted
//! chunks.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk;
use crate::config::Config;
use crate::embedding;
use crate::extract;
use crate::index::{Metric, VectorIndex};
use crate::models::SourceDocument;

const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "md"];

pub async fn run_ingest(config: &Config, paths: &[PathBuf], reset: bool) -> Result<()> {
    let files = collect_files(paths)?;
    if files.is_empty() {
        println!("ingest");
        println!("  no supported files found (pdf, docx, txt, md)");
        return Ok(());
    }

    let mut documents = Vec::new();
    let mut skipped = 0usize;
    for file in &files {
        match load_document(file) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", file.display(), e);
                skipped += 1;
            }
        }
    }

    let embedder = embedding::create_provider(&config.embedding)?;
    let metric = Metric::parse(&config.index.metric).unwrap_or(Metric::Cosine);
    let index = VectorIndex::open_or_create(&config.index.path, metric, embedder)
        .await?
        .with_batch_size(config.embedding.batch_size);
    if reset {
        index.reset().await?;
    }

    let chunks = chunk::split_documents(
        &documents,
        config.chunking.window_chars,
        config.chunking.overlap_chars,
    );
    index.add(&chunks).await?;

    println!("ingest");
    println!("  files found: {}", files.len());
    println!("  documents ingested: {}", documents.len());
    if skipped > 0 {
        println!("  files skipped: {}", skipped);
    }
    println!("  chunks written: {}", chunks.len());
    println!("  index size: {}", index.len().await?);
    println!("ok");

    index.close().await;
    Ok(())
}

/// Expand paths into supported files; directories are walked recursively.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry?;
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            if is_supported(path) {
                files.push(path.clone());
            } else {
                eprintln!("Warning: unsupported file type: {}", path.display());
            }
        } else {
            anyhow::bail!("path does not exist: {}", path.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load one file into a document of (page, text) pairs. Plain-text files
/// split into pages on form feeds when present, otherwise one page 0.
fn load_document(path: &Path) -> Result<SourceDocument> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let pages = match extension.as_str() {
        "pdf" => extract::extract_pages(&std::fs::read(path)?, extract::MIME_PDF)?,
        "docx" => extract::extract_pages(&std::fs::read(path)?, extract::MIME_DOCX)?,
        _ => {
            let text = std::fs::read_to_string(path)?;
            split_text_pages(&text)
        }
    };

    Ok(SourceDocument { filename, pages })
}

fn split_text_pages(text: &str) -> Vec<(i64, String)> {
    if text.contains('\u{0c}') {
        text.split('\u{0c}')
            .enumerate()
            .map(|(i, page)| (i as i64, page.to_string()))
            .collect()
    } else {
        vec![(0, text.to_string())]
    }
}
