//! The boundary surface consumed by the UI shell.
//!
//! [`ChatEngine`] wires the chunker, vector index, rewriter, answerer, and
//! session store together behind the small interface the shell calls:
//! ingestion, asking, and session management. Provider handles are injected
//! at construction — no process-wide clients.
//!
//! The shell is expected to serialize user actions; the engine itself does
//! not guard a session against concurrent writers.

use std::sync::Arc;

use anyhow::Result;

use crate::answer::Answerer;
use crate::chunk;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::Error;
use crate::generation::{self, GenerationProvider};
use crate::index::{Metric, VectorIndex};
use crate::models::{
    Answer, ChatTurn, Message, MessageMetadata, Role, Session, SourceCitation, SourceDocument,
};
use crate::rewrite::QueryRewriter;
use crate::store::SessionStore;

pub struct ChatEngine {
    index: VectorIndex,
    store: SessionStore,
    answerer: Answerer,
    window_chars: usize,
    overlap_chars: usize,
    history_window: usize,
}

/// How the engine should treat a missing index on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Fail with [`Error::IndexNotFound`] when nothing is persisted.
    OpenExisting,
    /// Create an empty index when nothing is persisted.
    CreateIfMissing,
}

impl ChatEngine {
    /// Assemble an engine from explicit parts. The constructor used by
    /// tests, with provider doubles injected.
    pub fn new(
        index: VectorIndex,
        store: SessionStore,
        generator: Arc<dyn GenerationProvider>,
        config: &Config,
    ) -> Self {
        let answerer = Answerer::new(
            QueryRewriter::new(generator.clone()),
            generator,
            config.retrieval.top_k,
            config.retrieval.excerpt_chars,
        );
        Self {
            index,
            store,
            answerer,
            window_chars: config.chunking.window_chars,
            overlap_chars: config.chunking.overlap_chars,
            history_window: config.history.window_turns,
        }
    }

    /// Assemble an engine from configuration, constructing the configured
    /// providers and opening both stores.
    pub async fn from_config(config: &Config, mode: IndexMode) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = embedding::create_provider(&config.embedding)?;
        let generator: Arc<dyn GenerationProvider> =
            generation::create_provider(&config.generation)?;

        let metric = Metric::parse(&config.index.metric).unwrap_or(Metric::Cosine);
        let index = match mode {
            IndexMode::OpenExisting => VectorIndex::open(&config.index.path, embedder).await?,
            IndexMode::CreateIfMissing => {
                VectorIndex::open_or_create(&config.index.path, metric, embedder).await?
            }
        };
        let index = index.with_batch_size(config.embedding.batch_size);

        let store = SessionStore::open(&config.db.path).await?;

        Ok(Self::new(index, store, generator, config))
    }

    /// Chunk and index a batch of documents. Returns the number of chunks
    /// written. Additive with respect to previously indexed documents.
    pub async fn build_index(&self, documents: &[SourceDocument]) -> Result<usize, Error> {
        let chunks = chunk::split_documents(documents, self.window_chars, self.overlap_chars);
        self.index.add(&chunks).await?;
        Ok(chunks.len())
    }

    /// One conversational turn: rewrite against recent history, retrieve,
    /// synthesize, then durably record the (user, assistant) pair. Nothing
    /// is recorded unless generation fully returns, so a failed attempt can
    /// simply be retried.
    pub async fn ask(&self, session_id: i64, question: &str) -> Result<Answer, Error> {
        if !self.store.session_exists(session_id).await? {
            return Err(Error::UnknownSession(session_id));
        }

        let history = self.recent_history(session_id).await?;
        let answer = self.answerer.answer(question, &history, &self.index).await?;

        self.store
            .record_exchange(session_id, question, &answer.text, &answer.sources)
            .await?;

        Ok(answer)
    }

    /// The last `history.window_turns` stored messages as prompt turns.
    async fn recent_history(&self, session_id: i64) -> Result<Vec<ChatTurn>, Error> {
        let messages = self.store.load_history(session_id).await?;
        let skip = messages.len().saturating_sub(self.history_window);
        Ok(messages
            .into_iter()
            .skip(skip)
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    pub async fn new_session(&self, title: Option<&str>) -> Result<i64, Error> {
        match title {
            Some(title) => self.store.create_session(title).await,
            None => {
                let title = self.store.next_auto_title().await?;
                self.store.create_session(&title).await
            }
        }
    }

    pub async fn default_session(&self) -> Result<i64, Error> {
        self.store.ensure_default_session().await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, Error> {
        self.store.list_sessions().await
    }

    pub async fn delete_session(&self, id: i64) -> Result<(), Error> {
        self.store.delete_session(id).await
    }

    pub async fn history(&self, id: i64) -> Result<Vec<Message>, Error> {
        self.store.load_history(id).await
    }

    /// Append a single turn on behalf of the shell, optionally carrying
    /// citations.
    pub async fn record_turn(
        &self,
        session_id: i64,
        role: Role,
        text: &str,
        sources: Option<Vec<SourceCitation>>,
    ) -> Result<i64, Error> {
        let metadata = sources.map(|sources| MessageMetadata::SourceCitations { sources });
        self.store
            .append_message(session_id, role, text, metadata.as_ref())
            .await
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}
