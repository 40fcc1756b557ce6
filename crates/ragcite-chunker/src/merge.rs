//! Post-processing: merge undersized chunks into their successor.

use ragcite_core::{Chunk, ChunkOptions};

const SEPARATOR: &str = "\n\n";

/// Merge each below-minimum chunk (other than the last) with the next chunk
/// when the joined content fits in `max_chunk_size`, then renumber
/// `chunk_index` from zero.
///
/// A merged chunk keeps the first chunk's id, takes the union of both
/// metadata maps with the second chunk's values winning, is marked
/// `merged`, and has no offsets. A merged chunk is not merged again.
#[must_use]
pub fn merge_small_chunks(chunks: Vec<Chunk>, options: &ChunkOptions) -> Vec<Chunk> {
    let separator_len = SEPARATOR.chars().count();
    let mut merged = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter().peekable();

    while let Some(current) = iter.next() {
        let current_len = current.char_len();
        if current_len < options.min_chunk_size {
            let fits = |next: &Chunk| {
                current_len + separator_len + next.char_len() <= options.max_chunk_size
            };
            if let Some(next) = iter.next_if(fits) {
                merged.push(join(current, &next));
                continue;
            }
        }
        merged.push(current);
    }

    for (index, chunk) in merged.iter_mut().enumerate() {
        chunk.chunk_index = index as u32;
    }

    merged
}

fn join(mut first: Chunk, second: &Chunk) -> Chunk {
    first.content.push_str(SEPARATOR);
    first.content.push_str(&second.content);
    first.metadata.union(&second.metadata);
    first.metadata.merged = true;
    first.start_offset = None;
    first.end_offset = None;
    first
}
