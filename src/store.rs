//! Durable session and message store.
//!
//! Exclusively owns the `sessions` and `messages` tables. Messages are
//! append-only and replay in (timestamp, id) order to reconstruct a
//! transcript. Opening the store runs the schema migrations in
//! [`crate::migrate`].

use std::path::Path;

use sqlx::{Row, SqlitePool};

use crate::db;
use crate::error::Error;
use crate::migrate;
use crate::models::{Message, MessageMetadata, Role, Session, SourceCitation};

pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Open (creating and migrating if needed) the session database.
    pub async fn open(path: &Path) -> Result<Self, Error> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Create a session with a fresh, monotonically increasing id.
    pub async fn create_session(&self, title: &str) -> Result<i64, Error> {
        let now = chrono::Utc::now().timestamp();
        let id = sqlx::query("INSERT INTO sessions (title, created_at) VALUES (?, ?)")
            .bind(title)
            .bind(now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        tracing::debug!(id, title, "session created");
        Ok(id)
    }

    /// Sessions ordered newest-first by creation time.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, Error> {
        let rows = sqlx::query(
            "SELECT id, title, created_at FROM sessions ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Session {
                id: row.get("id"),
                title: row.get("title"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Most recent session, creating "Chat 1" when none exists. The implicit
    /// default used when the caller has not picked a session.
    pub async fn ensure_default_session(&self) -> Result<i64, Error> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM sessions ORDER BY created_at DESC, id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        match existing {
            Some(id) => Ok(id),
            None => self.create_session("Chat 1").await,
        }
    }

    /// Next "Chat {n}" title for an untitled session.
    pub async fn next_auto_title(&self) -> Result<String, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(format!("Chat {}", count + 1))
    }

    /// Delete a session and all its messages. Idempotent: deleting an id
    /// that does not exist is a no-op.
    pub async fn delete_session(&self, id: i64) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn session_exists(&self, id: i64) -> Result<bool, Error> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Append one message durably. Fails with [`Error::UnknownSession`] when
    /// the session does not exist — no orphaned inserts.
    pub async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<i64, Error> {
        if !self.session_exists(session_id).await? {
            return Err(Error::UnknownSession(session_id));
        }

        let metadata_json = metadata.map(serde_json::to_string).transpose()?;
        let now = chrono::Utc::now().timestamp();

        let id = sqlx::query(
            "INSERT INTO messages (session_id, role, content, metadata, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(metadata_json)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Append a completed (question, answer) pair in one transaction, the
    /// assistant message carrying the citations. Used once generation has
    /// fully returned, so a failed answer attempt records nothing.
    pub async fn record_exchange(
        &self,
        session_id: i64,
        question: &str,
        answer: &str,
        sources: &[SourceCitation],
    ) -> Result<(), Error> {
        let metadata = MessageMetadata::SourceCitations {
            sources: sources.to_vec(),
        };
        let metadata_json = serde_json::to_string(&metadata)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?)")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(Error::UnknownSession(session_id));
        }

        sqlx::query(
            "INSERT INTO messages (session_id, role, content, metadata, timestamp)
             VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(session_id)
        .bind(Role::User.as_str())
        .bind(question)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO messages (session_id, role, content, metadata, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(Role::Assistant.as_str())
        .bind(answer)
        .bind(&metadata_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Messages of a session in ascending (timestamp, id) order. A deleted
    /// or unknown session yields an empty transcript.
    pub async fn load_history(&self, session_id: i64) -> Result<Vec<Message>, Error> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, metadata, timestamp
             FROM messages WHERE session_id = ?
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let role_raw: String = row.get("role");
                let role = Role::parse(&role_raw).unwrap_or_else(|| {
                    tracing::warn!(role = %role_raw, "unrecognized role in stored message");
                    Role::User
                });
                let metadata = row
                    .get::<Option<String>, _>("metadata")
                    .and_then(|json| match serde_json::from_str(&json) {
                        Ok(meta) => Some(meta),
                        Err(e) => {
                            tracing::warn!(error = %e, "unreadable message metadata");
                            None
                        }
                    });
                Message {
                    id: row.get("id"),
                    session_id: row.get("session_id"),
                    role,
                    content: row.get("content"),
                    metadata,
                    timestamp: row.get("timestamp"),
                }
            })
            .collect())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
