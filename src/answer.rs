//! Retrieval-augmented answer synthesis.
//!
//! An explicit pipeline of named stages with typed outputs:
//!
//! ```text
//! Rewriting ──▶ Retrieving ──▶ Synthesizing ──▶ Done
//!  standalone     top-k           grounded
//!  query          chunks          answer + sources
//! ```
//!
//! Retrieval stays query-focused (the standalone, disambiguated question)
//! while grounding stays conversation-aware (the generator still sees recent
//! history for tone and continuity). Retrieved chunks are returned as
//! sources in retrieval order whether or not the generated text cites them.

use std::sync::Arc;

use crate::error::Error;
use crate::generation::GenerationProvider;
use crate::index::VectorIndex;
use crate::models::{Answer, ChatTurn, SearchHit, SourceCitation};
use crate::rewrite::QueryRewriter;

/// Grounding instruction; the retrieved context block is appended per call.
const GROUNDING_INSTRUCTION: &str = "You are an expert technical assistant. \
Use ONLY the information provided in the context below. \
Your task is to provide a detailed, well-structured, and explanatory answer. \
Guidelines: \
- Explain concepts step-by-step \
- Provide background if needed \
- Use bullet points or numbered sections where helpful \
- If the answer has multiple aspects, cover all of them \
- If the context is insufficient, explicitly say what is missing";

/// Output of the rewriting stage.
struct StandaloneQuery(String);

/// Output of the retrieval stage: candidate chunks, best-first.
struct RetrievedContext {
    hits: Vec<SearchHit>,
}

pub struct Answerer {
    rewriter: QueryRewriter,
    generator: Arc<dyn GenerationProvider>,
    top_k: usize,
    excerpt_chars: usize,
}

impl Answerer {
    pub fn new(
        rewriter: QueryRewriter,
        generator: Arc<dyn GenerationProvider>,
        top_k: usize,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            rewriter,
            generator,
            top_k,
            excerpt_chars,
        }
    }

    /// Run the full pipeline. An empty retrieval result is not an error:
    /// the generator still runs and is expected to report the missing
    /// context per its instructions.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatTurn],
        index: &VectorIndex,
    ) -> Result<Answer, Error> {
        let query = self.rewrite_stage(history, question).await?;
        let retrieved = self.retrieve_stage(index, &query).await?;
        self.synthesize_stage(question, history, retrieved).await
    }

    async fn rewrite_stage(
        &self,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<StandaloneQuery, Error> {
        let query = self.rewriter.rewrite(history, question).await?;
        tracing::debug!(query = %query, "rewriting done");
        Ok(StandaloneQuery(query))
    }

    async fn retrieve_stage(
        &self,
        index: &VectorIndex,
        query: &StandaloneQuery,
    ) -> Result<RetrievedContext, Error> {
        let hits = index.search(&query.0, self.top_k).await?;
        tracing::debug!(hits = hits.len(), "retrieval done");
        Ok(RetrievedContext { hits })
    }

    async fn synthesize_stage(
        &self,
        question: &str,
        history: &[ChatTurn],
        retrieved: RetrievedContext,
    ) -> Result<Answer, Error> {
        let context = format_context(&retrieved.hits);
        let system = format!("{}\n\nContext:\n{}", GROUNDING_INSTRUCTION, context);

        let mut turns = history.to_vec();
        turns.push(ChatTurn::user(question));

        let text = self.generator.generate(&system, &turns).await?;

        let sources = retrieved
            .hits
            .iter()
            .map(|hit| SourceCitation {
                source: hit.chunk.source.clone(),
                page: hit.chunk.page,
                excerpt: truncate_excerpt(&hit.chunk.text, self.excerpt_chars),
            })
            .collect();

        Ok(Answer { text, sources })
    }
}

/// Candidate chunk texts in retrieval order, separated by blank lines.
fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Truncate to at most `max` bytes on a char boundary.
fn truncate_excerpt(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
