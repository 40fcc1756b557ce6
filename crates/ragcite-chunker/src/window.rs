//! Sliding window chunking with overlap.
//!
//! Used when structure-aware chunking produces chunks outside the configured
//! bounds.

use ragcite_core::{Chunk, ChunkMetadata, ChunkMethod, ChunkOptions};

use crate::span::{Span, is_terminator};

/// Chunk normalized text with an overlapping fixed-size window.
///
/// Windows advance by `chunk_size - chunk_overlap`. Unless a window is the
/// last one, its end snaps back to the last sentence terminator found in the
/// final 20% of the window. Windows shorter than `min_chunk_size` are dropped,
/// except a final window that covers text no earlier window did.
#[must_use]
pub fn window_chunks(document_id: &str, text: &str, options: &ChunkOptions) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    windows_in(document_id, &chars, options)
}

pub(crate) fn windows_in(document_id: &str, chars: &[char], options: &ChunkOptions) -> Vec<Chunk> {
    let total = chars.len();
    let step = options
        .chunk_size
        .saturating_sub(options.chunk_overlap)
        .max(1);

    let mut chunks = Vec::new();
    let mut covered = 0;
    let mut start = 0;

    while start < total {
        let target_end = (start + options.chunk_size).min(total);
        let end = if target_end < total && options.respect_sentence_boundaries {
            find_break_point(chars, start, target_end, options.chunk_size)
        } else {
            target_end
        };

        let is_final = end >= total;
        let span = Span::new(start, end).trim(chars);
        let long_enough = span.len() >= options.min_chunk_size;
        let adds_tail = is_final && span.end > covered;

        if !span.is_empty() && (long_enough || adds_tail) {
            let index = chunks.len();
            chunks.push(Chunk {
                id: format!("{document_id}_chunk_{index}"),
                document_id: document_id.to_string(),
                content: span.text(chars),
                chunk_index: index as u32,
                start_offset: Some(span.start),
                end_offset: Some(span.end),
                metadata: ChunkMetadata {
                    method: Some(ChunkMethod::SimpleOverlap),
                    ..Default::default()
                },
            });
            covered = span.end;
        }

        if is_final {
            break;
        }
        // Never step past the snapped end, so no text falls between windows.
        start = (start + step).min(end);
    }

    chunks
}

/// Find the end of the last sentence within the final 20% of the window.
fn find_break_point(chars: &[char], start: usize, target_end: usize, window: usize) -> usize {
    let search_start = start + window * 4 / 5;

    for i in (search_start..target_end).rev() {
        if is_terminator(chars[i]) && i + 1 < target_end && chars[i + 1].is_whitespace() {
            return i + 1;
        }
    }

    target_end
}
