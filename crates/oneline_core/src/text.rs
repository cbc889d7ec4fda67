/// Length in characters, the unit every limit in this workspace is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Collapses whitespace in extracted page text.
///
/// - any whitespace run containing a line break becomes a single `\n`
/// - any other run of two or more whitespace characters becomes a single space
/// - a lone tab becomes a space; other lone whitespace characters are kept
/// - leading and trailing whitespace is removed
///
/// The output is a fixed point: normalizing it again returns it unchanged.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run_len = 0usize;
    let mut run_first = ' ';
    let mut run_has_break = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if run_len == 0 {
                run_first = c;
            }
            run_len += 1;
            run_has_break |= is_line_break(c);
            continue;
        }
        if run_len > 0 && !out.is_empty() {
            if run_has_break {
                out.push('\n');
            } else if run_len > 1 || run_first == '\t' {
                out.push(' ');
            } else {
                out.push(run_first);
            }
        }
        run_len = 0;
        run_has_break = false;
        out.push(c);
    }

    out
}

/// Bounds the text sent to the model.
///
/// Text of at most `max_chars` characters is returned whole. Longer text is cut
/// after the last line break inside the first `max_chars` characters, unless
/// that would keep fewer than `min_chars`, in which case it is hard-cut at
/// `max_chars`.
pub fn truncate_for_model(text: &str, max_chars: usize, min_chars: usize) -> &str {
    let Some((hard_end, _)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let window = &text[..hard_end];
    match window.rfind('\n') {
        Some(idx) if char_len(&window[..idx]) >= min_chars => &window[..idx],
        _ => window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_and_blank_lines_collapse_to_one_break() {
        assert_eq!(normalize_whitespace("a\r\n\r\n  \n\tb"), "a\nb");
    }

    #[test]
    fn lone_nbsp_survives_but_runs_do_not() {
        assert_eq!(normalize_whitespace("a\u{a0}b  c\u{a0} d"), "a\u{a0}b c d");
    }

    #[test]
    fn model_input_prefers_line_boundary() {
        let text = format!("{}\n{}", "a".repeat(20), "b".repeat(20));
        assert_eq!(truncate_for_model(&text, 30, 10), "a".repeat(20));
        assert_eq!(truncate_for_model(&text, 30, 25), &text[..30]);
        assert_eq!(truncate_for_model(&text, 100, 10), text);
    }
}
