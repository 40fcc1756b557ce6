//! Hierarchical chunking strategy.
//!
//! Sections are kept whole when they fit. Larger sections are packed
//! paragraph by paragraph; paragraphs above the hard limit are packed sentence
//! by sentence, and sentences above it word by word. When the result still
//! breaks the size bounds the whole document is re-chunked with a sliding
//! window instead.

use ragcite_core::{Chunk, ChunkError, ChunkMetadata, ChunkMethod, ChunkOptions, Chunker};
use tracing::debug;

use crate::merge::merge_small_chunks;
use crate::normalize::normalize_text;
use crate::sections::{Section, sections_in};
use crate::span::{self, Span};
use crate::window::windows_in;

/// Structure-aware chunker with a sliding-window fallback.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalChunker {
    options: ChunkOptions,
}

/// A span and the method that produced it.
#[derive(Debug, Clone, Copy)]
struct Piece {
    span: Span,
    method: ChunkMethod,
}

impl HierarchicalChunker {
    /// Create a chunker, rejecting inconsistent options.
    pub fn new(options: ChunkOptions) -> Result<Self, ChunkError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The options this chunker was built with.
    #[must_use]
    pub fn options(&self) -> &ChunkOptions {
        &self.options
    }

    /// Chunk a document's text.
    ///
    /// Empty or whitespace-only input yields no chunks.
    #[must_use]
    pub fn chunk_text(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = normalized.chars().collect();

        let mut chunks = self.hierarchical(document_id, &chars);
        if chunks.is_empty() || self.needs_rechunking(&chunks) {
            debug!(
                document_id,
                "Hierarchical chunks out of bounds, falling back to sliding window"
            );
            chunks = windows_in(document_id, &chars, &self.options);
        }

        let chunks = merge_small_chunks(chunks, &self.options);
        debug!("Created {} chunks for document {}", chunks.len(), document_id);
        chunks
    }

    fn hierarchical(&self, document_id: &str, chars: &[char]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for section in sections_in(chars) {
            for (n, piece) in self.chunk_section(chars, &section).into_iter().enumerate() {
                let index = chunks.len() as u32;
                chunks.push(Chunk {
                    id: format!("{document_id}_section_{}_chunk_{n}", section.index),
                    document_id: document_id.to_string(),
                    content: piece.span.text(chars),
                    chunk_index: index,
                    start_offset: Some(piece.span.start),
                    end_offset: Some(piece.span.end),
                    metadata: ChunkMetadata {
                        section: Some(section.index),
                        section_title: section.title.clone(),
                        method: Some(piece.method),
                        ..Default::default()
                    },
                });
            }
        }

        chunks
    }

    fn chunk_section(&self, chars: &[char], section: &Section) -> Vec<Piece> {
        let span = section.span();
        if span.len() <= self.options.chunk_size {
            return vec![Piece {
                span,
                method: ChunkMethod::SectionIntact,
            }];
        }

        let paragraphs = if self.options.respect_paragraph_boundaries {
            span::paragraphs(chars, span)
        } else {
            vec![span]
        };

        let mut pieces = Vec::new();
        self.pack(chars, &paragraphs, ChunkMethod::ParagraphBoundary, &mut pieces);
        pieces
    }

    /// Greedily join adjacent units while the joined span fits in
    /// `chunk_size`. Units above `max_chunk_size` are split one level down.
    fn pack(&self, chars: &[char], units: &[Span], method: ChunkMethod, out: &mut Vec<Piece>) {
        let mut current: Option<Span> = None;

        for &unit in units {
            if let Some(cur) = current {
                if unit.end - cur.start > self.options.chunk_size {
                    out.push(Piece { span: cur, method });
                    current = None;
                }
            }

            if unit.len() > self.options.max_chunk_size {
                if let Some(cur) = current.take() {
                    out.push(Piece { span: cur, method });
                }
                self.split_oversized(chars, unit, method, out);
                continue;
            }

            current = Some(match current {
                Some(cur) => cur.join(unit),
                None => unit,
            });
        }

        if let Some(cur) = current {
            out.push(Piece { span: cur, method });
        }
    }

    fn split_oversized(&self, chars: &[char], unit: Span, level: ChunkMethod, out: &mut Vec<Piece>) {
        match level {
            ChunkMethod::SectionIntact | ChunkMethod::ParagraphBoundary
                if self.options.respect_sentence_boundaries =>
            {
                let sentences = span::sentences(chars, unit);
                self.pack(chars, &sentences, ChunkMethod::SentenceBoundary, out);
            }
            ChunkMethod::ArbitrarySplit | ChunkMethod::SimpleOverlap => {
                self.force_split(unit, out);
            }
            _ => {
                let words = span::words(chars, unit);
                self.pack(chars, &words, ChunkMethod::ArbitrarySplit, out);
            }
        }
    }

    /// Cut a single unbreakable token into `chunk_size` pieces.
    fn force_split(&self, unit: Span, out: &mut Vec<Piece>) {
        let mut start = unit.start;
        while start < unit.end {
            let end = (start + self.options.chunk_size).min(unit.end);
            out.push(Piece {
                span: Span::new(start, end),
                method: ChunkMethod::ArbitrarySplit,
            });
            start = end;
        }
    }

    /// Any chunk outside `[min_chunk_size, max_chunk_size]` sends the
    /// document to the sliding window.
    fn needs_rechunking(&self, chunks: &[Chunk]) -> bool {
        chunks.iter().any(|chunk| {
            let len = chunk.char_len();
            len < self.options.min_chunk_size || len > self.options.max_chunk_size
        })
    }
}

impl Chunker for HierarchicalChunker {
    fn name(&self) -> &str {
        "hierarchical"
    }

    fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        self.chunk_text(document_id, text)
    }
}
