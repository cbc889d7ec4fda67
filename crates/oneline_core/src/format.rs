//! Format contract for model output.
//!
//! Every function here is a pure predicate or repair over a string; the
//! generator composes them into clean -> validate -> enforce length.
use std::sync::LazyLock;

use regex::Regex;

use crate::text::char_len;

/// Hard cap on the length of a returned summary, in characters.
pub const MAX_SUMMARY_CHARS: usize = 80;

/// Cut points are only honoured from this index onwards.
const MIN_CUT_INDEX: usize = 10;

const CUT_MARKS: [char; 6] = ['。', '、', '.', ',', '，', '．'];

const QUOTE_PAIRS: [(char, char); 5] = [
    ('"', '"'),
    ('\'', '\''),
    ('“', '”'),
    ('「', '」'),
    ('『', '』'),
];

static JAPANESE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{3040}-\u{30ff}\u{3400}-\u{4dbf}\u{4e00}-\u{9fff}]")
        .expect("Failed to compile Japanese regex")
});
static KUTEN_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"。+").expect("Failed to compile kuten regex"));
static LATIN_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]([^A-Za-z0-9_]|$)").expect("Failed to compile terminator regex")
});
static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://").expect("Failed to compile URL regex"));
static PICTOGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Extended_Pictographic}").expect("Failed to compile emoji regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatViolation {
    #[error("no Japanese characters")]
    NotJapanese,
    #[error("more than one sentence")]
    MultipleSentences,
    #[error("contains a URL, hashtag or emoji")]
    ForbiddenContent,
}

/// True when the text has at least one Hiragana, Katakana or CJK ideograph.
pub fn contains_japanese(text: &str) -> bool {
    JAPANESE.is_match(text)
}

/// Collapses runs of `。` first, then counts terminators.
///
/// `。。` counts once; any two separate `。`, or a `。` plus a Latin `.`, `!`
/// or `?` that is not followed by a word character, count as two sentences.
pub fn is_single_sentence(text: &str) -> bool {
    let collapsed = KUTEN_RUN.replace_all(text, "。");
    let kuten = collapsed.matches('。').count();
    let latin = count_latin_terminators(&collapsed);
    kuten + latin <= 1
}

// Matches overlap when terminators are adjacent ("?!"), so step one char at a time.
fn count_latin_terminators(text: &str) -> usize {
    let mut count = 0;
    let mut pos = 0;
    while let Some(found) = LATIN_TERMINATOR.find_at(text, pos) {
        count += 1;
        pos = found.start() + 1;
    }
    count
}

/// URLs, `#`/`＃` markers and pictographic emoji are not allowed.
pub fn has_forbidden_content(text: &str) -> bool {
    URL_SCHEME.is_match(text)
        || text.contains(&['#', '＃'][..])
        || PICTOGRAPH.is_match(text)
}

pub fn validate_format(text: &str) -> Result<(), FormatViolation> {
    if !contains_japanese(text) {
        return Err(FormatViolation::NotJapanese);
    }
    if !is_single_sentence(text) {
        return Err(FormatViolation::MultipleSentences);
    }
    if has_forbidden_content(text) {
        return Err(FormatViolation::ForbiddenContent);
    }
    Ok(())
}

/// Trims, collapses whitespace (line breaks included) to single spaces and
/// strips one pair of wrapping quotes.
pub fn clean_model_output(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = collapsed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    collapsed
}

/// Caps `text` at `max_chars` characters.
///
/// Over-long text is cut right after the last clause or sentence mark inside
/// the first `max_chars` characters when that mark sits at index 10 or later;
/// otherwise it is hard-cut with no marker appended. A Latin `.` or `,`
/// followed by a word character (`Node.js`, `1,000`) is not a cut point.
pub fn enforce_max_chars(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    // One extra char so the mark at the last index still has a lookahead.
    let chars: Vec<char> = text.chars().take(max_chars + 1).collect();
    let cut = (0..max_chars)
        .rev()
        .find(|&idx| is_cut_point(chars[idx], chars.get(idx + 1).copied()));
    let end = match cut {
        Some(idx) if idx >= MIN_CUT_INDEX => idx + 1,
        _ => max_chars,
    };
    chars[..end].iter().collect()
}

fn is_cut_point(mark: char, next: Option<char>) -> bool {
    if !CUT_MARKS.contains(&mark) {
        return false;
    }
    match mark {
        '.' | ',' => !next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => true,
    }
}
