//! Section detection.
//!
//! Sections start at header lines and run until the next header. Three header
//! styles are recognized:
//!
//! - markdown headings (`# Title`, `## Title`)
//! - all-caps labels ending in a colon (`SUMMARY:`)
//! - numbered headings (`1. Introduction`, `2 Methods`)

use crate::span::Span;

/// A section of normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Position of the section in the document
    pub index: u32,
    /// Header line, without markdown `#` markers
    pub title: Option<String>,
    /// Character offset of the first character
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
}

impl Section {
    pub(crate) fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Check whether a line is a section header.
#[must_use]
pub fn is_section_header(line: &str) -> bool {
    let line = line.trim();
    if line.starts_with('#') {
        return true;
    }
    is_caps_label(line) || is_numbered_heading(line)
}

fn is_caps_label(line: &str) -> bool {
    line.chars().count() > 3
        && line.ends_with(':')
        && line.chars().any(char::is_uppercase)
        && !line.chars().any(char::is_lowercase)
}

fn is_numbered_heading(line: &str) -> bool {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return false;
    }
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let after_space = rest.trim_start();
    if after_space.len() == rest.len() {
        return false;
    }
    after_space
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
}

/// Split normalized text into sections.
///
/// Header lines belong to the section they open. Text before the first header
/// forms an untitled section.
#[must_use]
pub fn parse_sections(text: &str) -> Vec<Section> {
    let chars: Vec<char> = text.chars().collect();
    sections_in(&chars)
}

pub(crate) fn sections_in(chars: &[char]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for line in lines(chars) {
        let line_text = line.text(chars);
        if line_text.trim().is_empty() {
            continue;
        }

        if is_section_header(&line_text) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(Section {
                index: 0,
                title: Some(
                    line_text
                        .trim()
                        .trim_start_matches('#')
                        .trim()
                        .to_string(),
                ),
                start: line.start,
                end: line.end,
            });
        } else if let Some(section) = current.as_mut() {
            section.end = line.end;
        } else {
            current = Some(Section {
                index: 0,
                title: None,
                start: line.start,
                end: line.end,
            });
        }
    }

    if let Some(section) = current {
        sections.push(section);
    }

    for (i, section) in sections.iter_mut().enumerate() {
        section.index = i as u32;
    }

    sections
}

/// Line spans, excluding the newline characters.
fn lines(chars: &[char]) -> Vec<Span> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &c) in chars.iter().enumerate() {
        if c == '\n' {
            out.push(Span::new(start, i));
            start = i + 1;
        }
    }
    if start < chars.len() {
        out.push(Span::new(start, chars.len()));
    }
    out
}
