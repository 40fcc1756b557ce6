//! Citation parsing for ragcite.
//!
//! Generated answers cite retrieved chunks with numbered markers. This crate
//! resolves those markers against the ranked chunk list and produces
//! annotations, HTML-rendered text, block quotes with surrounding context,
//! and a per-source summary.
//!
//! Two marker families are recognised:
//!
//! - inline references: `[1]`, `[1,3]`
//! - block quotes: `> "exact text" [2]` (the quote may span lines)
//!
//! # Example
//!
//! ```rust,ignore
//! use ragcite_cite::{CitationParser, build_source_citations};
//!
//! let parser = CitationParser::new();
//! let annotated = parser.parse("Revenue rose [1].", &chunks);
//! let sources = build_source_citations(&chunks, &annotated.annotations);
//! ```

mod markers;
pub mod parser;
mod snippet;
pub mod sources;

pub use parser::CitationParser;
pub use sources::{UNKNOWN_DOCUMENT, build_source_citations};
