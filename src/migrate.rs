//! Session database schema migrations.
//!
//! The schema carries an explicit version marker (the `schema_version`
//! table); migration is a versioned sequence of idempotent transforms keyed
//! on it, not ad hoc table inspection at call sites.
//!
//! Version history:
//! - **v1** — a single `messages(role, content, timestamp)` chat log with no
//!   sessions and no metadata, predating this crate.
//! - **v2** (current) — `sessions` + `messages` with session linkage and a
//!   metadata column.
//!
//! The v1 → v2 transform renames the old table to `messages_legacy` as a
//! retained backup, creates the current schema, materializes a synthetic
//! "Legacy Session", and re-inserts every old message under it. The backup
//! is never dropped by this crate; if a backup already exists while the live
//! table is still legacy-shaped, migration aborts with
//! [`Error::MigrationIntegrity`] rather than overwrite it.

use sqlx::{Row, SqlitePool};

use crate::error::Error;

pub const CURRENT_VERSION: i64 = 2;

const LEGACY_BACKUP_TABLE: &str = "messages_legacy";
const LEGACY_SESSION_TITLE: &str = "Legacy Session";

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), Error> {
    match detect_version(pool).await? {
        0 => init_schema(pool).await,
        1 => migrate_v1_to_v2(pool).await,
        CURRENT_VERSION => ensure_version_marker(pool).await,
        other => Err(Error::MigrationIntegrity(format!(
            "database reports schema version {}, newer than this build supports ({})",
            other, CURRENT_VERSION
        ))),
    }
}

/// Infer the schema version. Databases written before the version marker
/// existed are classified by the shape of their `messages` table.
async fn detect_version(pool: &SqlitePool) -> Result<i64, Error> {
    if table_exists(pool, "schema_version").await? {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;
        return Ok(version.unwrap_or(0));
    }

    if table_exists(pool, "messages").await? {
        let columns = table_columns(pool, "messages").await?;
        let current_shape = columns.iter().any(|c| c == "session_id")
            && columns.iter().any(|c| c == "metadata");
        return Ok(if current_shape { CURRENT_VERSION } else { 1 });
    }

    Ok(0)
}

/// Fresh database: create the current schema directly.
async fn init_schema(pool: &SqlitePool) -> Result<(), Error> {
    let mut tx = pool.begin().await?;
    create_current_tables(&mut tx).await?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_VERSION)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(version = CURRENT_VERSION, "session schema initialized");
    Ok(())
}

/// Current-shaped database missing the version marker (written by an
/// earlier build of the current schema): adopt it in place.
async fn ensure_version_marker(pool: &SqlitePool) -> Result<(), Error> {
    if table_exists(pool, "schema_version").await? {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    create_current_tables(&mut tx).await?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_VERSION)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// v1 → v2: preserve every legacy message under a synthetic session.
async fn migrate_v1_to_v2(pool: &SqlitePool) -> Result<(), Error> {
    let columns = table_columns(pool, "messages").await?;
    for required in ["role", "content", "timestamp"] {
        if !columns.iter().any(|c| c == required) {
            return Err(Error::MigrationIntegrity(format!(
                "legacy messages table is missing the '{}' column; cannot migrate without data loss",
                required
            )));
        }
    }

    if table_exists(pool, LEGACY_BACKUP_TABLE).await? {
        return Err(Error::MigrationIntegrity(format!(
            "backup table {} already exists alongside a legacy messages table; \
             refusing to overwrite the backup — resolve manually",
            LEGACY_BACKUP_TABLE
        )));
    }

    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        "ALTER TABLE messages RENAME TO {}",
        LEGACY_BACKUP_TABLE
    ))
    .execute(&mut *tx)
    .await?;

    create_current_tables(&mut tx).await?;

    let now = chrono::Utc::now().timestamp();
    let legacy_session_id = sqlx::query("INSERT INTO sessions (title, created_at) VALUES (?, ?)")
        .bind(LEGACY_SESSION_TITLE)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    // CAST keeps the decode uniform whether the legacy column held unix
    // integers or DATETIME strings.
    let rows = sqlx::query(&format!(
        "SELECT role, content, CAST(timestamp AS TEXT) AS ts_text FROM {} \
         ORDER BY timestamp ASC, rowid ASC",
        LEGACY_BACKUP_TABLE
    ))
    .fetch_all(&mut *tx)
    .await?;

    let migrated = rows.len();
    for row in &rows {
        let role: String = row.get("role");
        let content: String = row.get("content");
        let timestamp = decode_legacy_timestamp(row);

        sqlx::query(
            "INSERT INTO messages (session_id, role, content, metadata, timestamp)
             VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(legacy_session_id)
        .bind(&role)
        .bind(&content)
        .bind(timestamp)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_VERSION)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        migrated,
        backup = LEGACY_BACKUP_TABLE,
        "migrated legacy messages into the Legacy Session"
    );
    Ok(())
}

async fn create_current_tables(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
) -> Result<(), Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id)",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Legacy timestamps may be unix integers or SQLite DATETIME strings.
fn decode_legacy_timestamp(row: &sqlx::sqlite::SqliteRow) -> i64 {
    let raw: Option<String> = row.try_get("ts_text").unwrap_or(None);
    let raw = raw.unwrap_or_default();
    if let Some(ts) = parse_datetime_text(&raw) {
        return ts;
    }
    raw.trim().parse::<i64>().unwrap_or(0)
}

fn parse_datetime_text(raw: &str) -> Option<i64> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    None
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool, Error> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name = ?",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn table_columns(pool: &SqlitePool, name: &str) -> Result<Vec<String>, Error> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", name))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
}
