//! History-aware query rewriting.
//!
//! Turns a (history, question) pair into a standalone search query with
//! pronouns and ellipsis resolved against the conversation, so retrieval can
//! run without the history. With no history there is nothing to resolve and
//! the question passes through untouched — no generation call is made.

use std::sync::Arc;

use crate::error::Error;
use crate::generation::GenerationProvider;
use crate::models::ChatTurn;

/// Instruction for the reformulation call. The provider must not answer the
/// question, only restate it.
pub const REWRITE_INSTRUCTION: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

pub struct QueryRewriter {
    generator: Arc<dyn GenerationProvider>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }

    /// Produce a standalone question. Falls back to the original question
    /// when the provider returns an empty or whitespace-only string rather
    /// than searching with a degenerate query. Provider errors propagate.
    pub async fn rewrite(&self, history: &[ChatTurn], question: &str) -> Result<String, Error> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let mut turns = history.to_vec();
        turns.push(ChatTurn::user(question));

        let rewritten = self.generator.generate(REWRITE_INSTRUCTION, &turns).await?;
        let rewritten = rewritten.trim();

        if rewritten.is_empty() {
            tracing::warn!("rewriter returned a degenerate query; using original question");
            return Ok(question.to_string());
        }

        Ok(rewritten.to_string())
    }
}
