//! Per-source summaries and chunk-derived citation fields.

use ragcite_core::{Annotation, Chunk, CitationLocation, SourceCitation};

/// Document name used when a chunk carries none.
pub const UNKNOWN_DOCUMENT: &str = "Unknown Document";

const PREVIEW_CHARS: usize = 200;

/// Summarise each ranked chunk as a source, counting the annotations that cite it.
///
/// `chunks` must be in the order the citation numbers refer to.
#[must_use]
pub fn build_source_citations(chunks: &[Chunk], annotations: &[Annotation]) -> Vec<SourceCitation> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let number = i + 1;
            let used_in_annotations: Vec<String> = annotations
                .iter()
                .filter(|a| a.citation_number as usize == number)
                .map(|a| a.id.clone())
                .collect();

            SourceCitation {
                document_id: chunk.document_id.clone(),
                document_name: document_name(chunk),
                chunk_id: chunk.id.clone(),
                content: preview(&chunk.content),
                relevance_score: relevance(chunk),
                page_number: chunk.metadata.page_number,
                section: section_label(chunk),
                citation_count: used_in_annotations.len() as u32,
                used_in_annotations,
            }
        })
        .collect()
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

pub(crate) fn document_name(chunk: &Chunk) -> String {
    chunk
        .metadata
        .document_name
        .clone()
        .unwrap_or_else(|| UNKNOWN_DOCUMENT.to_string())
}

/// Similarity score clamped to `[0, 1]`; missing scores count as 0.
pub(crate) fn relevance(chunk: &Chunk) -> f32 {
    let score = chunk.metadata.similarity_score.unwrap_or(0.0);
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

pub(crate) fn section_label(chunk: &Chunk) -> Option<String> {
    chunk
        .metadata
        .section_title
        .clone()
        .or_else(|| chunk.metadata.section.map(|s| s.to_string()))
}

pub(crate) fn location_for(chunk: &Chunk) -> CitationLocation {
    CitationLocation {
        document_id: chunk.document_id.clone(),
        document_name: document_name(chunk),
        chunk_id: chunk.id.clone(),
        page_number: chunk.metadata.page_number,
        section: section_label(chunk),
        start_char: chunk.start_offset,
        end_char: chunk.end_offset,
    }
}
