//! Whitespace normalization applied before chunking.

/// Normalize document text.
///
/// Runs of spaces and tabs collapse to one space and each line is trimmed.
/// Runs of blank lines collapse to a single paragraph break (`"\n\n"`), so the
/// result keeps the line and paragraph structure that section and paragraph
/// splitting depend on. Runs of three or more periods become `...`.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_pending = false;

    for line in text.lines() {
        let collapsed = collapse_line(line);
        if collapsed.is_empty() {
            blank_pending = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_pending { "\n\n" } else { "\n" });
        }
        blank_pending = false;
        out.push_str(&collapsed);
    }

    out
}

fn collapse_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut periods = 0usize;

    for word in line.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
            periods = 0;
        }
        for c in word.chars() {
            if c == '.' {
                periods += 1;
                if periods > 3 {
                    continue;
                }
            } else {
                periods = 0;
            }
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("  \n\t\n   "), "");
    }

    #[test]
    fn test_collapses_horizontal_whitespace() {
        assert_eq!(normalize_text("  a\t\tb   c  "), "a b c");
    }

    #[test]
    fn test_keeps_single_newlines() {
        assert_eq!(normalize_text("line one\nline two"), "line one\nline two");
    }

    #[test]
    fn test_collapses_blank_line_runs() {
        assert_eq!(normalize_text("a\n\n\n  \n\nb"), "a\n\nb");
    }

    #[test]
    fn test_normalizes_crlf() {
        assert_eq!(normalize_text("a\r\nb\r\n\r\nc"), "a\nb\n\nc");
    }

    #[test]
    fn test_collapses_long_ellipsis() {
        assert_eq!(normalize_text("wait...... what."), "wait... what.");
        assert_eq!(normalize_text("one..two"), "one..two");
    }
}
