//! Marker scanning.

use regex::Regex;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    /// `[1]` or `[1,2]`
    Inline,
    /// `> "text" [1]`; `quote` is the byte range of the quoted text
    BlockQuote { quote: Range<usize> },
}

/// A citation marker found in generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Marker<'a> {
    /// Byte range of the whole marker
    pub span: Range<usize>,
    pub kind: MarkerKind,
    /// Citation numbers exactly as written
    pub numbers: Vec<&'a str>,
}

impl Marker<'_> {
    pub fn is_block_quote(&self) -> bool {
        matches!(self.kind, MarkerKind::BlockQuote { .. })
    }
}

/// Find all markers in position order.
///
/// Block quotes win: an inline marker overlapping a block-quote span is part
/// of that quote, not a marker of its own.
pub(crate) fn find_markers<'a>(text: &'a str, inline: &Regex, block: &Regex) -> Vec<Marker<'a>> {
    let mut markers: Vec<Marker<'a>> = block
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let quote = caps.get(1)?;
            let number = caps.get(2)?;
            Some(Marker {
                span: whole.range(),
                kind: MarkerKind::BlockQuote {
                    quote: quote.range(),
                },
                numbers: vec![number.as_str()],
            })
        })
        .collect();

    let inline_markers: Vec<Marker<'a>> = inline
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let numbers = caps.get(1)?;
            Some(Marker {
                span: whole.range(),
                kind: MarkerKind::Inline,
                numbers: numbers.as_str().split(',').collect(),
            })
        })
        .filter(|candidate| {
            !markers
                .iter()
                .any(|b| candidate.span.start < b.span.end && b.span.start < candidate.span.end)
        })
        .collect();

    markers.extend(inline_markers);
    markers.sort_by_key(|m| m.span.start);
    markers
}

/// Resolve a written citation number against a list of `len` chunks.
pub(crate) fn resolve(raw: &str, len: usize) -> Option<u32> {
    raw.parse::<u32>()
        .ok()
        .filter(|&n| n >= 1 && n as usize <= len)
}
