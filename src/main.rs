//! # docchat CLI
//!
//! The `docchat` binary is the stand-in UI shell: it serializes user actions
//! and calls into the retrieval and persistence core.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the session database and run schema migrations |
//! | `docchat ingest <paths…>` | Extract, chunk, embed, and index documents |
//! | `docchat ask "<question>"` | Ask a grounded question in a session |
//! | `docchat search "<query>"` | Retrieval-only query against the index |
//! | `docchat sessions <cmd>` | Manage conversation sessions |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the session database
//! docchat init --config ./config/docchat.toml
//!
//! # Ingest a directory of PDFs
//! docchat ingest ./papers --config ./config/docchat.toml
//!
//! # Ask in the most recent session (created if none exists)
//! docchat ask "What does chapter 2 cover?"
//!
//! # Continue a specific session
//! docchat ask "And what about chapter 3?" --session 2
//!
//! # Inspect retrieval without generating
//! docchat search "deployment checklist" --limit 8
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{chat, config, ingest, search, sessions, store};

/// docchat — document-grounded conversational retrieval with durable chat
/// sessions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — chat with your documents, grounded in retrieved passages",
    version,
    long_about = "docchat ingests documents, indexes them for semantic search, and answers \
    multi-turn questions grounded in retrieved passages. Conversations are stored durably \
    as sessions that survive restarts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the session database.
    ///
    /// Creates the SQLite database and runs schema migrations, including the
    /// legacy single-table chat log migration. Idempotent. The vector index
    /// is created on first `ingest` (its metadata records the embedding
    /// model in use).
    Init,

    /// Ingest documents into the vector index.
    ///
    /// Accepts files or directories (walked recursively). Supported formats:
    /// PDF, DOCX, plain text, Markdown. Ingestion is additive; use `--reset`
    /// to clear the index first.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Clear previously indexed chunks before ingesting.
        #[arg(long)]
        reset: bool,
    },

    /// Ask a question grounded in the indexed documents.
    ///
    /// Rewrites the question against the session's recent history, retrieves
    /// the closest chunks, and generates an answer constrained to them. The
    /// (question, answer) pair is recorded in the session with citations.
    Ask {
        /// The question to ask.
        question: String,

        /// Session to continue. Defaults to the most recent session,
        /// creating one if none exists.
        #[arg(long)]
        session: Option<i64>,
    },

    /// Retrieval-only query against the index (no generation, no session
    /// writes).
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Manage conversation sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

/// Session management subcommands.
#[derive(Subcommand)]
enum SessionAction {
    /// Create a new session.
    New {
        /// Session title. Defaults to "Chat {n}".
        #[arg(long)]
        title: Option<String>,
    },

    /// List sessions, newest first.
    List,

    /// Delete a session and all its messages. Deleting an unknown id is a
    /// no-op.
    Delete {
        /// Session id.
        id: i64,
    },

    /// Print a session's transcript in order, with citations.
    History {
        /// Session id.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = store::SessionStore::open(&cfg.db.path).await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, reset } => {
            ingest::run_ingest(&cfg, &paths, reset).await?;
        }
        Commands::Ask { question, session } => {
            chat::run_ask(&cfg, &question, session).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Sessions { action } => match action {
            SessionAction::New { title } => {
                sessions::run_new(&cfg, title).await?;
            }
            SessionAction::List => {
                sessions::run_list(&cfg).await?;
            }
            SessionAction::Delete { id } => {
                sessions::run_delete(&cfg, id).await?;
            }
            SessionAction::History { id } => {
                sessions::run_history(&cfg, id).await?;
            }
        },
    }

    Ok(())
}
