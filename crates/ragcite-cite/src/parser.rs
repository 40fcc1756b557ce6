//! Citation marker parser.

use ragcite_core::{AnnotatedText, Annotation, BlockQuote, Chunk, QuoteType};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::markers::{Marker, MarkerKind, find_markers, resolve};
use crate::snippet::{context_after, context_before, sentence_around, tidy};
use crate::sources::{location_for, relevance};

/// Inline reference marker, `[1]` or `[1,2]`.
pub const INLINE_PATTERN: &str = r"\[(\d+(?:,\d+)*)\]";

/// Block quote marker, `> "quoted text" [1]`, quote may span lines.
pub const BLOCK_QUOTE_PATTERN: &str = r#"(?s)> "(.*?)" \[(\d+)\]"#;

/// Resolves citation markers in generated text against a ranked chunk list.
///
/// Citation number `n` refers to `chunks[n - 1]`. Numbers outside the list
/// are left as written and produce no annotation.
#[derive(Debug, Clone)]
pub struct CitationParser {
    inline: Regex,
    block_quote: Regex,
}

impl CitationParser {
    /// Create a parser with the standard marker patterns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inline: Regex::new(INLINE_PATTERN).expect("valid inline citation pattern"),
            block_quote: Regex::new(BLOCK_QUOTE_PATTERN).expect("valid block quote pattern"),
        }
    }

    /// Parse `text`, producing one annotation per resolved citation occurrence.
    ///
    /// `citation_map` holds the first annotation id for each number, and the
    /// rendered markup links every marker for that number to that id.
    #[must_use]
    pub fn parse(&self, text: &str, chunks: &[Chunk]) -> AnnotatedText {
        let markers = find_markers(text, &self.inline, &self.block_quote);

        let mut annotations = Vec::new();
        let mut citation_map = BTreeMap::new();

        for marker in &markers {
            let numbers: Vec<u32> = marker
                .numbers
                .iter()
                .filter_map(|raw| resolve(raw, chunks.len()))
                .collect();
            if numbers.is_empty() {
                continue;
            }

            let (snippet, quote_type) = match &marker.kind {
                MarkerKind::BlockQuote { quote } => (text[quote.clone()].to_string(), QuoteType::Quote),
                MarkerKind::Inline => (self.reference_snippet(text, marker), QuoteType::Reference),
            };

            for number in numbers {
                let chunk = &chunks[number as usize - 1];
                let annotation = Annotation {
                    id: short_id("annotation"),
                    citation_number: number,
                    text_snippet: snippet.clone(),
                    source_content: chunk.content.clone(),
                    location: location_for(chunk),
                    relevance_score: relevance(chunk),
                    quote_type,
                };
                citation_map
                    .entry(number)
                    .or_insert_with(|| annotation.id.clone());
                annotations.push(annotation);
            }
        }

        let formatted_text = render(text, &markers, &citation_map);
        debug!(
            "Parsed {} markers into {} annotations",
            markers.len(),
            annotations.len()
        );

        AnnotatedText {
            raw_text: text.to_string(),
            formatted_text,
            annotations,
            citation_map,
        }
    }

    /// Block quotes whose citation number resolves, with surrounding context.
    #[must_use]
    pub fn extract_block_quotes(&self, text: &str, chunks: &[Chunk]) -> Vec<BlockQuote> {
        find_markers(text, &self.inline, &self.block_quote)
            .into_iter()
            .filter_map(|marker| {
                let MarkerKind::BlockQuote { quote } = &marker.kind else {
                    return None;
                };
                let number = resolve(marker.numbers.first()?, chunks.len())?;
                let chunk = &chunks[number as usize - 1];
                Some(BlockQuote {
                    id: short_id("quote"),
                    content: text[quote.clone()].to_string(),
                    location: location_for(chunk),
                    context_before: context_before(text, marker.span.start),
                    context_after: context_after(text, marker.span.end),
                })
            })
            .collect()
    }

    /// The sentence around an inline marker with every inline marker removed.
    fn reference_snippet(&self, text: &str, marker: &Marker<'_>) -> String {
        let sentence = &text[sentence_around(text, &marker.span)];
        tidy(&self.inline.replace_all(sentence, ""))
    }
}

impl Default for CitationParser {
    fn default() -> Self {
        Self::new()
    }
}

fn short_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &uuid[..8])
}

/// Replace resolved markers with citation markup, last marker first so
/// earlier byte ranges stay valid.
fn render(text: &str, markers: &[Marker<'_>], citation_map: &BTreeMap<u32, String>) -> String {
    let mut formatted = text.to_string();

    for marker in markers.iter().rev() {
        let linked: Vec<(&str, Option<&String>)> = marker
            .numbers
            .iter()
            .map(|raw| {
                let id = raw.parse::<u32>().ok().and_then(|n| citation_map.get(&n));
                (*raw, id)
            })
            .collect();
        if linked.iter().all(|(_, id)| id.is_none()) {
            continue;
        }

        let replacement = match &marker.kind {
            MarkerKind::Inline => linked
                .iter()
                .map(|(raw, id)| match id {
                    Some(id) => format!(
                        r#"<cite data-annotation="{id}" data-citation="{raw}" class="citation-link">[{raw}]</cite>"#
                    ),
                    None => format!("[{raw}]"),
                })
                .collect::<String>(),
            MarkerKind::BlockQuote { quote } => {
                let (raw, id) = linked[0];
                let id = id.map_or("", String::as_str);
                format!(
                    r#"<blockquote data-annotation="{id}" data-citation="{raw}" class="citation-quote">{}</blockquote>"#,
                    &text[quote.clone()]
                )
            }
        };
        formatted.replace_range(marker.span.clone(), &replacement);
    }

    formatted
}
