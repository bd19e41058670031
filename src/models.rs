//! Core data models used throughout docchat.
//!
//! These types represent the documents, chunks, sessions, and messages that
//! flow through the indexing pipeline and the conversation store.

use serde::{Deserialize, Serialize};

/// A raw source document during ingestion: a filename plus ordered pages of
/// text. Transient — only chunks derived from it are persisted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    /// Ordered (page number, page text) pairs. Page numbers start at 0.
    pub pages: Vec<(i64, String)>,
}

impl SourceDocument {
    /// Single-page document, page number 0.
    pub fn single_page(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            pages: vec![(0, text.into())],
        }
    }
}

/// A bounded text window extracted from a document. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Originating filename.
    pub source: String,
    /// Page the chunk's text starts on.
    pub page: i64,
    /// Position within the document's chunk sequence.
    pub seq: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk surfaced by the index as evidence, with its similarity score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (role, text) turn passed to the rewriter and answerer. Carries no
/// persistence identity — purely a prompt-building input.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A named conversation thread.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub title: String,
    /// Unix seconds, UTC.
    pub created_at: i64,
}

/// One persisted turn in a session. Append-only: never mutated or reordered
/// after creation.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub session_id: i64,
    pub role: Role,
    pub content: String,
    /// `None` means no metadata was recorded (legacy rows included), which
    /// is distinct from an empty citation list.
    pub metadata: Option<MessageMetadata>,
    /// Unix seconds, UTC.
    pub timestamp: i64,
}

/// Structured metadata attached to a message, serialized as a tagged JSON
/// blob so it round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageMetadata {
    SourceCitations { sources: Vec<SourceCitation> },
}

/// Evidence reference persisted with an assistant message: where a retrieved
/// chunk came from plus a display excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub source: String,
    pub page: i64,
    pub excerpt: String,
}

/// The answerer's output: the generated text plus the retrieved sources it
/// was grounded on, in retrieval order.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceCitation>,
}
