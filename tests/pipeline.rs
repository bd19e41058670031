//! End-to-end pipeline tests with deterministic provider doubles: ingest →
//! rewrite → retrieve → synthesize → record, against real on-disk stores.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use docchat::config::{Config, DbConfig, IndexConfig};
use docchat::embedding::EmbeddingProvider;
use docchat::engine::ChatEngine;
use docchat::error::Error;
use docchat::generation::GenerationProvider;
use docchat::index::{Metric, VectorIndex};
use docchat::models::{ChatTurn, MessageMetadata, Role, SourceDocument};
use docchat::rewrite::REWRITE_INSTRUCTION;
use docchat::store::SessionStore;

// ============ Provider doubles ============

/// Bag-of-words embedder: texts sharing words land near each other.
struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn dims(&self) -> usize {
        32
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 32];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let mut hasher = DefaultHasher::new();
                    word.to_lowercase().hash(&mut hasher);
                    v[(hasher.finish() as usize) % 32] += 1.0;
                }
                v
            })
            .collect())
    }
}

struct RecordedCall {
    system: String,
    turns: Vec<ChatTurn>,
}

/// Generator that pops scripted replies in order and records every call.
struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted-generator"
    }

    async fn generate(&self, system: &str, turns: &[ChatTurn]) -> Result<String, Error> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            turns: turns.to_vec(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Generation("script exhausted".to_string()))
    }
}

struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-generator"
    }

    async fn generate(&self, _system: &str, _turns: &[ChatTurn]) -> Result<String, Error> {
        Err(Error::Generation("provider unavailable".to_string()))
    }
}

// ============ Harness ============

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("chat.sqlite"),
        },
        index: IndexConfig {
            path: root.join("index.sqlite"),
            metric: "cosine".to_string(),
        },
        chunking: Default::default(),
        retrieval: Default::default(),
        history: Default::default(),
        embedding: Default::default(),
        generation: Default::default(),
    }
}

async fn engine_with(
    root: &Path,
    config: &Config,
    generator: Arc<dyn GenerationProvider>,
) -> ChatEngine {
    let index = VectorIndex::open_or_create(
        &root.join("index.sqlite"),
        Metric::Cosine,
        Arc::new(HashEmbedder),
    )
    .await
    .unwrap();
    let store = SessionStore::open(&root.join("chat.sqlite")).await.unwrap();
    ChatEngine::new(index, store, generator, config)
}

// ============ Scenarios ============

#[tokio::test]
async fn single_document_grounded_answer_with_citation() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let generator = ScriptedGenerator::new(&["The capital of France is Paris."]);
    let engine = engine_with(tmp.path(), &config, generator.clone()).await;

    let doc = SourceDocument::single_page("france.txt", "The capital of France is Paris.");
    let written = engine.build_index(&[doc]).await.unwrap();
    assert_eq!(written, 1);

    let session = engine.new_session(None).await.unwrap();
    let answer = engine
        .ask(session, "What is the capital of France?")
        .await
        .unwrap();

    assert!(answer.text.contains("Paris"));
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source, "france.txt");
    assert_eq!(answer.sources[0].page, 0);
    assert!(answer.sources[0].excerpt.contains("Paris"));

    // Empty history: no rewrite call was made, and the synthesis call's
    // context contained the retrieved chunk.
    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].system.contains("The capital of France is Paris."));
    assert_eq!(
        calls[0].turns.last().unwrap().content,
        "What is the capital of France?"
    );
    drop(calls);

    // The exchange was durably recorded with the citation intact.
    let history = engine.history(session).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "What is the capital of France?");
    assert_eq!(history[1].role, Role::Assistant);
    match &history[1].metadata {
        Some(MessageMetadata::SourceCitations { sources }) => {
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].source, "france.txt");
            assert_eq!(sources[0].page, 0);
        }
        other => panic!("expected citations, got {:?}", other),
    }
}

#[tokio::test]
async fn second_turn_rewrites_against_history() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let generator = ScriptedGenerator::new(&[
        // Turn 1 (empty history): synthesis only.
        "Hamlet was written by William Shakespeare.",
        // Turn 2: rewrite, then synthesis.
        "When was William Shakespeare born?",
        "Shakespeare was born in 1564.",
    ]);
    let engine = engine_with(tmp.path(), &config, generator.clone()).await;

    let doc = SourceDocument::single_page(
        "bard.txt",
        "William Shakespeare wrote Hamlet. Shakespeare was born in 1564 in Stratford.",
    );
    engine.build_index(&[doc]).await.unwrap();

    let session = engine.new_session(Some("bard questions")).await.unwrap();
    engine.ask(session, "Who wrote Hamlet?").await.unwrap();
    let answer = engine.ask(session, "When was he born?").await.unwrap();

    assert!(answer.text.contains("1564"));

    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);

    // The rewrite call carried the prior exchange and the raw follow-up.
    let rewrite_call = &calls[1];
    assert_eq!(rewrite_call.system, REWRITE_INSTRUCTION);
    assert_eq!(rewrite_call.turns[0].content, "Who wrote Hamlet?");
    assert_eq!(rewrite_call.turns.last().unwrap().content, "When was he born?");

    // Synthesis was grounded on chunks retrieved for the standalone query,
    // and saw raw history for continuity.
    let synth_call = &calls[2];
    assert!(synth_call.system.contains("Shakespeare"));
    assert_eq!(synth_call.turns[0].content, "Who wrote Hamlet?");
    assert_eq!(synth_call.turns.last().unwrap().content, "When was he born?");
}

#[tokio::test]
async fn failed_generation_records_no_messages() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let engine = engine_with(tmp.path(), &config, Arc::new(FailingGenerator)).await;

    let doc = SourceDocument::single_page("facts.txt", "Some indexed fact.");
    engine.build_index(&[doc]).await.unwrap();

    let session = engine.new_session(None).await.unwrap();
    let err = engine.ask(session, "Anything?").await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));

    // Nothing partial was persisted; the caller can retry cleanly.
    assert!(engine.history(session).await.unwrap().is_empty());
}

#[tokio::test]
async fn ask_on_unknown_session_fails_before_any_provider_call() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let generator = ScriptedGenerator::new(&[]);
    let engine = engine_with(tmp.path(), &config, generator.clone()).await;

    let err = engine.ask(999, "hello?").await.unwrap_err();
    assert!(matches!(err, Error::UnknownSession(999)));
    assert_eq!(generator.calls.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn history_passed_to_providers_is_bounded() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    // Default window: last 5 turns.
    let generator = ScriptedGenerator::new(&["standalone query", "an answer"]);
    let engine = engine_with(tmp.path(), &config, generator.clone()).await;

    let doc = SourceDocument::single_page("facts.txt", "Background material.");
    engine.build_index(&[doc]).await.unwrap();

    let session = engine.new_session(None).await.unwrap();
    for i in 0..4 {
        engine
            .record_turn(session, Role::User, &format!("question {}", i), None)
            .await
            .unwrap();
        engine
            .record_turn(session, Role::Assistant, &format!("answer {}", i), None)
            .await
            .unwrap();
    }

    engine.ask(session, "latest question").await.unwrap();

    let calls = generator.calls.lock().unwrap();
    // Rewrite call: 5 history turns + the new question.
    assert_eq!(calls[0].turns.len(), 6);
    // The oldest turns were dropped.
    assert_eq!(calls[0].turns[0].content, "answer 1");
}

#[tokio::test]
async fn index_persists_across_engine_restart() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());

    {
        let generator = ScriptedGenerator::new(&[]);
        let engine = engine_with(tmp.path(), &config, generator).await;
        let doc = SourceDocument::single_page("keep.txt", "Durable indexed content about oak trees.");
        engine.build_index(&[doc]).await.unwrap();
    }

    // Fresh engine over the same files: reopen without re-ingesting.
    let generator = ScriptedGenerator::new(&["Oak trees are durable."]);
    let engine = engine_with(tmp.path(), &config, generator).await;
    assert_eq!(engine.index().len().await.unwrap(), 1);

    let session = engine.new_session(None).await.unwrap();
    let answer = engine.ask(session, "Tell me about oak trees").await.unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source, "keep.txt");
}

#[tokio::test]
async fn record_turn_supports_explicit_citations() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let engine = engine_with(tmp.path(), &config, ScriptedGenerator::new(&[])).await;

    let session = engine.new_session(Some("manual")).await.unwrap();
    engine
        .record_turn(session, Role::User, "typed by the shell", None)
        .await
        .unwrap();
    engine
        .record_turn(
            session,
            Role::Assistant,
            "shell-recorded answer",
            Some(vec![]),
        )
        .await
        .unwrap();

    let history = engine.history(session).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].metadata, None);
    assert_eq!(
        history[1].metadata,
        Some(MessageMetadata::SourceCitations { sources: vec![] })
    );
}
