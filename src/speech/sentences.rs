//! Chunking replies into speakable sentences

use std::sync::LazyLock;

use regex::Regex;

/// Chunks shorter than this many words are merged into the next one
const MIN_CHUNK_WORDS: usize = 4;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

/// Split text on sentence terminators into chunks for playback
///
/// Empty pieces are dropped and chunks under four words are joined onto the
/// following chunk. Text with no usable pieces comes back whole.
#[must_use]
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let pieces: Vec<&str> = SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if pieces.is_empty() {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(pieces.len());
    let mut pending = String::new();

    for piece in pieces {
        if pending.is_empty() {
            pending.push_str(piece);
        } else {
            pending.push_str(". ");
            pending.push_str(piece);
        }

        if pending.split_whitespace().count() >= MIN_CHUNK_WORDS {
            chunks.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        chunks.push(pending);
    }

    chunks
}
