//! The deterministic chunker (§4.7 step 4, §8 property "chunking is pure").
//!
//! Paragraph-then-hard-split: the stable text is cut on blank-line paragraph
//! boundaries first, then any paragraph longer than `max_chars` is
//! hard-split with a bounded trailing overlap. Blank chunks are dropped.
//! Pure function of its inputs — no I/O, no clock, no randomness — so the
//! same `(stable_text, page_map, max_chars, overlap_chars)` always yields
//! byte-identical chunk boundaries and hashes.

use ricc_core::sha256_hex;
use serde::{Deserialize, Serialize};

/// One page's character span within the stable text, as produced by
/// extraction (§4.7 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub page: u32,
    pub start_char: usize,
    pub end_char: usize,
}

/// One chunk's boundaries and content hash, prior to `chunk_id` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub start_char: usize,
    pub end_char: usize,
    pub page_start: u32,
    pub page_end: u32,
    pub text_sha256: String,
}

/// The `chunk_set` artifact's manifest metadata (recorded alongside the
/// chunk spans so the policy that produced them is always recoverable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingManifest {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub split: String,
    pub count: usize,
}

fn page_for_offset(page_map: &[PageSpan], pos: usize) -> u32 {
    for span in page_map {
        if span.start_char <= pos && pos <= span.end_char {
            return span.page;
        }
    }
    page_map.last().map(|s| s.page).unwrap_or(1)
}

/// Splits `stable_text` into deterministic chunks bounded by `max_chars`,
/// with up to `overlap_chars` of trailing overlap between consecutive
/// hard-split pieces of the same paragraph.
///
/// `start_char`/`end_char` count Unicode scalar values (`char`s), not bytes
/// — matching how `page_map` offsets are produced during extraction and
/// keeping chunk boundaries stable regardless of which characters the
/// source document uses.
pub fn chunk_text(
    stable_text: &str,
    page_map: &[PageSpan],
    max_chars: usize,
    overlap_chars: usize,
) -> (Vec<ChunkSpan>, ChunkingManifest) {
    // Byte offset of the start of each char, plus a trailing sentinel at
    // `stable_text.len()`. Lets every subsequent step work in char-index
    // space while still producing valid UTF-8 slices for hashing.
    let mut char_byte_offsets: Vec<usize> = stable_text.char_indices().map(|(b, _)| b).collect();
    char_byte_offsets.push(stable_text.len());
    let n = char_byte_offsets.len() - 1;

    let slice = |start: usize, end: usize| -> &str {
        &stable_text[char_byte_offsets[start]..char_byte_offsets[end]]
    };

    let max_len = max_chars.max(1);
    let overlap = if max_len > 1 { overlap_chars.min(max_len - 1) } else { 0 };

    let mut chunks = Vec::new();
    let mut emit = |start: usize, end: usize| {
        let text = slice(start, end);
        if text.trim().is_empty() {
            return;
        }
        chunks.push(ChunkSpan {
            start_char: start,
            end_char: end,
            page_start: page_for_offset(page_map, start),
            page_end: page_for_offset(page_map, start.max(end.saturating_sub(1))),
            text_sha256: sha256_hex(text.as_bytes()),
        });
    };

    let mut i = 0usize;
    while i < n {
        let para_end = find_paragraph_break(stable_text, &char_byte_offsets, i).unwrap_or(n);
        let mut start = i;
        while start < para_end {
            let end = (start + max_len).min(para_end);
            emit(start, end);
            start = if overlap == 0 { end } else { (start + 1).max(end - overlap) };
        }
        i = para_end + 2;
    }

    let manifest = ChunkingManifest {
        max_chars: max_len,
        overlap_chars: overlap,
        split: "paragraph_then_hard".to_string(),
        count: chunks.len(),
    };
    (chunks, manifest)
}

/// Finds the char index of the next `"\n\n"` at or after char index `from`.
/// Returns `None` if there is no further paragraph break.
fn find_paragraph_break(text: &str, char_byte_offsets: &[usize], from: usize) -> Option<usize> {
    let from_byte = char_byte_offsets[from];
    let rel_byte = text.get(from_byte..)?.find("\n\n")?;
    let byte_pos = from_byte + rel_byte;
    // char_byte_offsets is sorted and has one entry per char index, so the
    // matching char index is the position of `byte_pos` within it.
    char_byte_offsets[from..].iter().position(|&b| b == byte_pos).map(|rel| from + rel)
}
