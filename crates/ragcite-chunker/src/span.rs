//! Character spans over normalized text.

/// Half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }

    /// Extend this span to cover `other`.
    pub fn join(self, other: Self) -> Self {
        Self::new(self.start, other.end)
    }

    pub fn text(self, chars: &[char]) -> String {
        chars[self.start..self.end].iter().collect()
    }

    /// Shrink the span past leading and trailing whitespace.
    pub fn trim(self, chars: &[char]) -> Self {
        let mut start = self.start;
        let mut end = self.end;
        while start < end && chars[start].is_whitespace() {
            start += 1;
        }
        while end > start && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        Self::new(start, end)
    }
}

pub(crate) fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Paragraphs are separated by a blank line.
pub(crate) fn paragraphs(chars: &[char], span: Span) -> Vec<Span> {
    let mut out = Vec::new();
    let mut start = span.start;
    let mut i = span.start;
    while i + 1 < span.end {
        if chars[i] == '\n' && chars[i + 1] == '\n' {
            push_trimmed(&mut out, chars, Span::new(start, i));
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    push_trimmed(&mut out, chars, Span::new(start, span.end));
    out
}

/// Sentences end at a run of terminators followed by whitespace.
///
/// The terminators stay with their sentence; the whitespace belongs to neither.
pub(crate) fn sentences(chars: &[char], span: Span) -> Vec<Span> {
    let mut out = Vec::new();
    let mut start = span.start;
    let mut i = span.start;
    while i < span.end {
        if is_terminator(chars[i]) {
            let mut j = i;
            while j < span.end && is_terminator(chars[j]) {
                j += 1;
            }
            if j < span.end && chars[j].is_whitespace() {
                push_trimmed(&mut out, chars, Span::new(start, j));
                start = j;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    push_trimmed(&mut out, chars, Span::new(start, span.end));
    out
}

/// Maximal runs of non-whitespace characters.
pub(crate) fn words(chars: &[char], span: Span) -> Vec<Span> {
    let mut out = Vec::new();
    let mut i = span.start;
    while i < span.end {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < span.end && !chars[i].is_whitespace() {
            i += 1;
        }
        out.push(Span::new(start, i));
    }
    out
}

fn push_trimmed(out: &mut Vec<Span>, chars: &[char], span: Span) {
    let trimmed = span.trim(chars);
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}
