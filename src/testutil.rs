//! Deterministic provider doubles for unit tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::Error;
use crate::generation::GenerationProvider;
use crate::models::ChatTurn;

/// Bag-of-words embedder: each word bumps one dimension picked by hash.
/// Texts sharing words land near each other under cosine similarity.
pub struct HashEmbedder {
    dims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dims: 32 }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dims];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let mut hasher = DefaultHasher::new();
                    word.to_lowercase().hash(&mut hasher);
                    v[(hasher.finish() as usize) % self.dims] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Embedder that always fails, for all-or-nothing assertions.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-embedder"
    }

    fn dims(&self) -> usize {
        32
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        Err(Error::Embedding("provider unavailable".to_string()))
    }
}

/// Recorded call to [`CannedGenerator`].
pub struct GenerationCall {
    pub system: String,
    pub turns: Vec<ChatTurn>,
}

/// Generator returning a fixed reply while recording every call.
pub struct CannedGenerator {
    reply: String,
    pub calls: Mutex<Vec<GenerationCall>>,
}

impl CannedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for CannedGenerator {
    fn model_name(&self) -> &str {
        "canned-generator"
    }

    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String, Error> {
        self.calls.lock().unwrap().push(GenerationCall {
            system: system.to_string(),
            turns: turns.to_vec(),
        });
        Ok(self.reply.clone())
    }
}

/// Generator that always fails, for no-partial-write assertions.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-generator"
    }

    async fn generate(&self, _system: &str, _turns: &[ChatTurn]) -> Result<String, Error> {
        Err(Error::Generation("provider unavailable".to_string()))
    }
}
