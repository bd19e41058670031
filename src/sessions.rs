//! Session management commands: list, create, delete, and transcript replay.

use anyhow::Result;

use crate::config::Config;
use crate::models::MessageMetadata;
use crate::store::SessionStore;

pub async fn run_new(config: &Config, title: Option<String>) -> Result<()> {
    let store = SessionStore::open(&config.db.path).await?;
    let title = match title {
        Some(title) => title,
        None => store.next_auto_title().await?,
    };
    let id = store.create_session(&title).await?;
    println!("created session {} ({})", id, title);
    store.close().await;
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = SessionStore::open(&config.db.path).await?;
    let sessions = store.list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions.");
        store.close().await;
        return Ok(());
    }

    for session in &sessions {
        let created = chrono::DateTime::from_timestamp(session.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{:>5}  {}  {}", session.id, created, session.title);
    }
    store.close().await;
    Ok(())
}

pub async fn run_delete(config: &Config, id: i64) -> Result<()> {
    let store = SessionStore::open(&config.db.path).await?;
    store.delete_session(id).await?;
    println!("deleted session {}", id);
    store.close().await;
    Ok(())
}

pub async fn run_history(config: &Config, id: i64) -> Result<()> {
    let store = SessionStore::open(&config.db.path).await?;
    let history = store.load_history(id).await?;

    if history.is_empty() {
        println!("No messages.");
        store.close().await;
        return Ok(());
    }

    for message in &history {
        println!("[{}] {}", message.role, message.content);
        // Absent metadata (legacy rows) prints nothing; an empty citation
        // list is shown as such — the two states stay distinguishable.
        if let Some(MessageMetadata::SourceCitations { sources }) = &message.metadata {
            if sources.is_empty() {
                println!("    sources: (none)");
            } else {
                println!("    sources:");
                for (i, source) in sources.iter().enumerate() {
                    println!(
                        "      {}. {} (page {}): \"{}\"",
                        i + 1,
                        source.source,
                        source.page,
                        source.excerpt.replace('\n', " ").trim()
                    );
                }
            }
        }
        println!();
    }
    store.close().await;
    Ok(())
}
