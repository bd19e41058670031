//! The `ask` command: one grounded conversational turn.

use anyhow::Result;

use crate::config::Config;
use crate::engine::{ChatEngine, IndexMode};

pub async fn run_ask(config: &Config, question: &str, session: Option<i64>) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question is empty");
    }

    let engine = ChatEngine::from_config(config, IndexMode::OpenExisting).await?;

    let session_id = match session {
        Some(id) => id,
        None => engine.default_session().await?,
    };

    let answer = engine.ask(session_id, question).await?;

    println!("{}", answer.text.trim_end());
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in answer.sources.iter().enumerate() {
            println!("  {}. {} (page {})", i + 1, source.source, source.page);
            let excerpt = source.excerpt.replace('\n', " ");
            let excerpt = excerpt.trim();
            if !excerpt.is_empty() {
                println!("     \"{}\"", excerpt);
            }
        }
    }
    println!();
    println!("session: {}", session_id);

    Ok(())
}
