//! Persistent vector index over document chunks.
//!
//! Owns (embedding, chunk) pairs in its own SQLite database, separate from
//! the session store. Adding chunks is additive and all-or-nothing per call:
//! every text in the batch is embedded before anything is written, and the
//! write happens in one transaction, so a provider failure never leaves the
//! persisted index partially updated.
//!
//! The similarity metric is fixed when the index is created and recorded in
//! the `index_meta` table; reopening uses the recorded metric.

use std::path::Path;
use std::sync::Arc;

use sqlx::{Row, SqlitePool};

use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::Error;
use crate::models::{Chunk, SearchHit};

/// Similarity metric, fixed at index creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    Dot,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Dot => "dot",
        }
    }

    pub fn parse(s: &str) -> Option<Metric> {
        match s {
            "cosine" => Some(Metric::Cosine),
            "dot" => Some(Metric::Dot),
            _ => None,
        }
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => embedding::cosine_similarity(a, b),
            Metric::Dot => embedding::dot_product(a, b),
        }
    }
}

pub struct VectorIndex {
    pool: SqlitePool,
    metric: Metric,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("metric", &self.metric)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Reopen a previously persisted index without re-embedding. Fails with
    /// [`Error::IndexNotFound`] when nothing is persisted at `path`.
    pub async fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::IndexNotFound {
                path: path.to_path_buf(),
            });
        }

        let pool = db::connect_existing(path).await?;
        let has_meta: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='index_meta'",
        )
        .fetch_one(&pool)
        .await?;
        if !has_meta {
            pool.close().await;
            return Err(Error::IndexNotFound {
                path: path.to_path_buf(),
            });
        }

        let metric_str: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'metric'")
                .fetch_optional(&pool)
                .await?;
        let metric = metric_str
            .as_deref()
            .and_then(Metric::parse)
            .unwrap_or(Metric::Cosine);

        let stored_model: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'model'")
                .fetch_optional(&pool)
                .await?;
        if let Some(stored) = stored_model {
            if stored != embedder.model_name() {
                tracing::warn!(
                    stored = %stored,
                    configured = %embedder.model_name(),
                    "index was built with a different embedding model"
                );
            }
        }

        Ok(Self::assemble(pool, metric, embedder))
    }

    /// Create a fresh index at `path` (parent directories included).
    pub async fn create(
        path: &Path,
        metric: Metric,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, Error> {
        let pool = db::connect(path).await?;
        create_schema(&pool, metric, embedder.as_ref()).await?;
        Ok(Self::assemble(pool, metric, embedder))
    }

    /// Open the index at `path`, creating it if it does not exist yet.
    pub async fn open_or_create(
        path: &Path,
        metric: Metric,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, Error> {
        match Self::open(path, embedder.clone()).await {
            Ok(index) => Ok(index),
            Err(Error::IndexNotFound { .. }) => Self::create(path, metric, embedder).await,
            Err(e) => Err(e),
        }
    }

    fn assemble(pool: SqlitePool, metric: Metric, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            pool,
            metric,
            embedder,
            batch_size: 64,
        }
    }

    /// Number of texts per embedding call during [`add`](Self::add).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Embed and persist a batch of chunks. Additive across calls; a fresh
    /// call never removes previously indexed chunks (see [`reset`](Self::reset)).
    pub async fn add(&self, chunks: &[Chunk]) -> Result<(), Error> {
        if chunks.is_empty() {
            return Ok(());
        }

        // Embed everything up front; an embedding failure aborts before any
        // write touches the persisted state.
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            vectors.extend(self.embedder.embed(&texts).await?);
        }
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let model = self.embedder.model_name().to_string();
        let dims = self.embedder.dims() as i64;

        let mut tx = self.pool.begin().await?;
        for (chunk, vec) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, source, page, seq, text, hash) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.page)
            .bind(chunk.seq)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, embedding, dims, model) VALUES (?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(embedding::vec_to_blob(vec))
            .bind(dims)
            .bind(&model)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(chunks = chunks.len(), model = %model, "indexed chunk batch");
        Ok(())
    }

    /// Return the `k` nearest chunks to `query`, best-first. Returns fewer
    /// than `k` only when the index holds fewer chunks; an empty index
    /// yields an empty result without calling the provider.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, Error> {
        if k == 0 || self.len().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embedding::embed_query(self.embedder.as_ref(), query).await?;

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source, c.page, c.seq, c.text, c.hash, v.embedding
            FROM chunks c
            JOIN chunk_vectors v ON v.chunk_id = c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                SearchHit {
                    chunk: Chunk {
                        id: row.get("id"),
                        source: row.get("source"),
                        page: row.get("page"),
                        seq: row.get("seq"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                    score: self.metric.score(&query_vec, &vec),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Number of chunks held by the index.
    pub async fn len(&self) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Remove every chunk and embedding. The explicit opt-out from additive
    /// indexing.
    pub async fn reset(&self) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn create_schema(
    pool: &SqlitePool,
    metric: Metric,
    embedder: &dyn EmbeddingProvider,
) -> Result<(), Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            page INTEGER NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            model TEXT NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
        .execute(pool)
        .await?;

    for (key, value) in [
        ("metric", metric.as_str().to_string()),
        ("model", embedder.model_name().to_string()),
        ("dims", embedder.dims().to_string()),
    ] {
        sqlx::query(
            "INSERT INTO index_meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    }

    Ok(())
}
