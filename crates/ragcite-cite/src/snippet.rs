//! Character windows around markers.
//!
//! Regex positions are byte offsets; window sizes are counted in characters.

use std::ops::Range;

/// Window size on each side of a marker.
pub(crate) const CONTEXT_CHARS: usize = 100;

/// Byte index `n` characters before `pos`, clamped to the start.
pub(crate) fn back_chars(text: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    text[..pos]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i)
}

/// Byte index `n` characters after `pos`, clamped to the end.
pub(crate) fn forward_chars(text: &str, pos: usize, n: usize) -> usize {
    text[pos..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| pos + i)
}

/// Byte range of the sentence around `span`, searched within a window of
/// [`CONTEXT_CHARS`] on either side.
pub(crate) fn sentence_around(text: &str, span: &Range<usize>) -> Range<usize> {
    let window_start = back_chars(text, span.start, CONTEXT_CHARS);
    let window_end = forward_chars(text, span.end, CONTEXT_CHARS);

    let start = text[window_start..span.start]
        .rfind(". ")
        .map_or(window_start, |i| window_start + i + 2);
    let end = text[span.end..window_end]
        .find(". ")
        .map_or(window_end, |i| span.end + i + 1);
    start..end
}

/// Text before `pos`, cut back to the last sentence boundary.
pub(crate) fn context_before(text: &str, pos: usize) -> Option<String> {
    let start = back_chars(text, pos, CONTEXT_CHARS);
    let mut context = text[start..pos].trim();
    if let Some(i) = context.rfind(". ") {
        context = &context[i + 2..];
    }
    non_empty(context)
}

/// Text after `pos`, cut at the first sentence boundary.
pub(crate) fn context_after(text: &str, pos: usize) -> Option<String> {
    let end = forward_chars(text, pos, CONTEXT_CHARS);
    let mut context = text[pos..end].trim();
    if let Some(i) = context.find(". ") {
        context = &context[..=i];
    }
    non_empty(context)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Collapse whitespace and drop spaces left in front of punctuation.
pub(crate) fn tidy(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }

    let mut tidied = String::with_capacity(out.len());
    for c in out.chars() {
        if matches!(c, '.' | ',' | ';' | ':' | '!' | '?') && tidied.ends_with(' ') {
            tidied.pop();
        }
        tidied.push(c);
    }
    tidied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_windows_respect_utf8() {
        let text = "héllo wörld";
        let pos = text.find('w').unwrap();
        assert_eq!(&text[back_chars(text, pos, 3)..pos], "lo ");
        assert_eq!(&text[pos..forward_chars(text, pos, 2)], "wö");
        assert_eq!(back_chars(text, pos, 100), 0);
        assert_eq!(forward_chars(text, pos, 100), text.len());
    }

    #[test]
    fn test_sentence_around() {
        let text = "First point. Revenue rose [1] sharply. Costs fell.";
        let start = text.find('[').unwrap();
        let span = start..start + 3;
        let range = sentence_around(text, &span);
        assert_eq!(&text[range], "Revenue rose [1] sharply.");
    }

    #[test]
    fn test_sentence_around_without_boundaries() {
        let text = "Revenue rose [1].";
        let start = text.find('[').unwrap();
        let range = sentence_around(text, &(start..start + 3));
        assert_eq!(&text[range], text);
    }

    #[test]
    fn test_context() {
        let text = "Intro. The report says > \"x\" [1] in summary. Later text.";
        let start = text.find('>').unwrap();
        let end = text.find("[1]").unwrap() + 3;
        assert_eq!(context_before(text, start).as_deref(), Some("The report says"));
        assert_eq!(context_after(text, end).as_deref(), Some("in summary."));
        assert_eq!(context_before(text, 0), None);
        assert_eq!(context_after(text, text.len()), None);
    }

    #[test]
    fn test_tidy() {
        assert_eq!(tidy("  Revenue   rose  .  "), "Revenue rose.");
        assert_eq!(tidy("a ,b\n\nc"), "a,b c");
    }
}
