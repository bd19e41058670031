//! # docchat
//!
//! Document-grounded conversational retrieval with durable chat sessions.
//!
//! docchat ingests documents, indexes them for semantic search, and answers
//! multi-turn questions grounded in retrieved passages instead of a model's
//! unaided memory. Sessions and their messages persist across restarts,
//! including migration of pre-session chat databases.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Documents │──▶│ Chunk+Embed  │──▶│ VectorIndex │
//! │ pdf/docx/ │   │              │   │  (SQLite)   │
//! │ txt/md    │   └──────────────┘   └──────┬──────┘
//! └───────────┘                             │ top-k
//!                                           ▼
//!    question ──▶ Rewrite ──▶ Retrieve ──▶ Synthesize ──▶ answer+sources
//!       ▲            │                          │               │
//!       │       recent history             grounding            ▼
//!       │            └───────────┬──────────────┘        ┌──────────────┐
//!       └────────────────────────┴───────────────────────│ SessionStore │
//!                                                        │   (SQLite)   │
//!                                                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init                          # create the session database
//! docchat ingest ./docs                 # chunk, embed, and index documents
//! docchat ask "What is covered here?"   # grounded answer with citations
//! docchat sessions list                 # conversation threads
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF/DOCX text extraction |
//! | [`chunk`] | Overlapping-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Generation provider abstraction |
//! | [`index`] | Persistent vector index |
//! | [`rewrite`] | History-aware query rewriting |
//! | [`answer`] | Retrieval-augmented answer synthesis |
//! | [`store`] | Session and message persistence |
//! | [`migrate`] | Session schema migrations |
//! | [`engine`] | Boundary surface for the UI shell |

pub mod answer;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod rewrite;
pub mod search;
pub mod sessions;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
