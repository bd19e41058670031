//! Error taxonomy for the retrieval and persistence core.
//!
//! Provider failures ([`Error::Embedding`], [`Error::Generation`]) are
//! surfaced as-is, without internal retry, so the caller can decide on
//! backoff. Store errors that would lose historical messages abort the
//! operation instead ([`Error::MigrationIntegrity`]).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No persisted index exists at the configured location.
    #[error("no index found at {}", path.display())]
    IndexNotFound { path: PathBuf },

    /// The embedding provider failed (network, quota, malformed response).
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The generation provider failed (network, quota, malformed response).
    #[error("generation provider error: {0}")]
    Generation(String),

    /// Operation referenced a session id that does not exist.
    #[error("unknown session: {0}")]
    UnknownSession(i64),

    /// Schema migration cannot guarantee zero data loss.
    #[error("migration cannot proceed safely: {0}")]
    MigrationIntegrity(String),

    /// Message metadata failed to (de)serialize.
    #[error("metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
