//! Document chunking for ragcite.
//!
//! [`HierarchicalChunker`] splits normalized text by sections, then paragraphs,
//! then sentences, then words, and falls back to an overlapping sliding window
//! when the structured result violates the configured size bounds.

pub mod hierarchical;
pub mod merge;
pub mod normalize;
pub mod sections;
mod span;
pub mod window;

pub use hierarchical::HierarchicalChunker;
pub use merge::merge_small_chunks;
pub use normalize::normalize_text;
pub use sections::{Section, is_section_header, parse_sections};
