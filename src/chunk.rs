//! Overlapping-window text chunker.
//!
//! Splits document pages into windows of at most `window` bytes with
//! `overlap` bytes shared between consecutive windows, so retrieval does not
//! lose context at window boundaries. Splitting prefers paragraph (`\n\n`),
//! then sentence, then whitespace boundaries before falling back to a hard
//! cut. Pages are split independently; a chunk is attributed to the page its
//! text starts on.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text for staleness
//! detection.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, SourceDocument};

/// Split a batch of documents. Chunk sequence positions are contiguous per
/// document, across its pages.
pub fn split_documents(docs: &[SourceDocument], window: usize, overlap: usize) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| split_document(doc, window, overlap))
        .collect()
}

/// Split one document into chunks. Whitespace-only input produces zero
/// chunks, not an error.
pub fn split_document(doc: &SourceDocument, window: usize, overlap: usize) -> Vec<Chunk> {
    assert!(window > 0, "window must be > 0");
    assert!(overlap < window, "overlap must be < window");

    let mut chunks = Vec::new();
    let mut seq: i64 = 0;

    for (page, text) in &doc.pages {
        for piece in split_page(text, window, overlap) {
            chunks.push(make_chunk(&doc.filename, *page, seq, &piece));
            seq += 1;
        }
    }

    chunks
}

/// Split a single page's text into overlapping windows.
fn split_page(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let mut out = Vec::new();
    if text.trim().is_empty() {
        return out;
    }

    let len = text.len();
    let mut start = 0usize;

    loop {
        let mut end = (start + window).min(len);
        while end < len && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end <= start {
            // Window narrower than one char; take the char whole.
            end = (start + 1..=len)
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(len);
        }
        if end < len {
            end = find_break(text, start, end);
        }

        let piece = &text[start..end];
        if !piece.trim().is_empty() {
            out.push(piece.to_string());
        }

        if end >= len {
            break;
        }

        let mut next = end.saturating_sub(overlap);
        while next > 0 && !text.is_char_boundary(next) {
            next -= 1;
        }
        if next <= start {
            // Window too small to overlap without stalling.
            next = end;
        }
        start = next;
    }

    out
}

/// Pick a cut position in `[start, hard_end)`, preferring paragraph, then
/// sentence, then whitespace boundaries in the back half of the window.
fn find_break(text: &str, start: usize, hard_end: usize) -> usize {
    let slice = &text[start..hard_end];
    let min_pos = slice.len() / 2;

    if let Some(pos) = slice.rfind("\n\n") {
        if pos > min_pos {
            return start + pos + 2;
        }
    }
    for sep in [". ", "! ", "? ", "\n"] {
        if let Some(pos) = slice.rfind(sep) {
            if pos > min_pos {
                return start + pos + sep.len();
            }
        }
    }
    if let Some(pos) = slice.rfind(' ') {
        if pos > min_pos {
            return start + pos + 1;
        }
    }

    hard_end
}

fn make_chunk(source: &str, page: i64, seq: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        page,
        seq,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pages: &[&str]) -> SourceDocument {
        SourceDocument {
            filename: "doc.txt".to_string(),
            pages: pages
                .iter()
                .enumerate()
                .map(|(i, t)| (i as i64, t.to_string()))
                .collect(),
        }
    }

    /// Re-join chunks by stripping the shared prefix of each successor.
    fn reconstruct(pieces: &[String]) -> String {
        let mut out = pieces[0].clone();
        for piece in &pieces[1..] {
            let max = piece.len().min(out.len());
            let mut shared = 0;
            for k in (0..=max).rev() {
                if piece.is_char_boundary(k) && out.ends_with(&piece[..k]) {
                    shared = k;
                    break;
                }
            }
            out.push_str(&piece[shared..]);
        }
        out
    }

    fn prose(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = split_document(&doc(&["Hello, world!"]), 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[0].page, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn whitespace_only_yields_no_chunks() {
        assert!(split_document(&doc(&["   \n\n  \t "]), 1000, 200).is_empty());
        assert!(split_document(&doc(&[""]), 1000, 200).is_empty());
    }

    #[test]
    fn every_chunk_within_window() {
        let text = prose(120);
        let chunks = split_document(&doc(&[&text]), 200, 40);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 200, "chunk too long: {}", c.text.len());
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = prose(120);
        let chunks = split_document(&doc(&[&text]), 200, 40);
        for pair in chunks.windows(2) {
            let prev = &pair[0].text;
            let next = &pair[1].text;
            // The successor must re-start inside the previous window.
            let head = &next[..next.len().min(40)];
            assert!(
                prev.contains(head),
                "no overlap between consecutive chunks:\n  prev: {:?}\n  next: {:?}",
                prev,
                next
            );
        }
    }

    #[test]
    fn reconstruction_reproduces_page_text() {
        let text = prose(150);
        let chunks = split_document(&doc(&[&text]), 300, 60);
        let pieces: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        assert_eq!(reconstruct(&pieces), text);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let para_a = "First paragraph with some words in it.";
        let para_b = "Second paragraph with more words following the break.";
        let text = format!("{}\n\n{}", para_a, para_b);
        // Window large enough to reach into paragraph B but not to hold both.
        let chunks = split_document(&doc(&[&text]), 60, 10);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].text, format!("{}\n\n", para_a));
    }

    #[test]
    fn chunks_attributed_to_their_page() {
        let chunks = split_document(&doc(&["Page zero text.", "Page one text."]), 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 0);
        assert_eq!(chunks[1].page, 1);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[1].seq, 1);
    }

    #[test]
    fn sequence_contiguous_across_pages() {
        let long = prose(60);
        let chunks = split_document(&doc(&[&long, &long]), 250, 50);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.seq, i as i64, "seq mismatch at position {}", i);
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "éclair à la crème ".repeat(60);
        let chunks = split_document(&doc(&[&text]), 100, 20);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.len() <= 100);
            // would have panicked on a bad boundary already; sanity check
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn deterministic_hashes() {
        let text = prose(40);
        let a = split_document(&doc(&[&text]), 200, 40);
        let b = split_document(&doc(&[&text]), 200, 40);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.seq, y.seq);
        }
    }
}
