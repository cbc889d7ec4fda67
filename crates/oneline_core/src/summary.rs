use std::fmt;

use crate::format::{
    contains_japanese, enforce_max_chars, validate_format, FormatViolation, MAX_SUMMARY_CHARS,
};
use crate::text::char_len;

/// A summary that passed every format check and fits in [`MAX_SUMMARY_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSummary(String);

impl ValidatedSummary {
    /// Validates an already cleaned candidate, then applies the length cap.
    ///
    /// The capped text is a prefix of a valid candidate, so only the Japanese
    /// check is repeated; a cut can in principle drop every Japanese character.
    pub fn new(candidate: &str) -> Result<Self, FormatViolation> {
        validate_format(candidate)?;
        let capped = enforce_max_chars(candidate, MAX_SUMMARY_CHARS);
        if !contains_japanese(&capped) {
            return Err(FormatViolation::NotJapanese);
        }
        debug_assert!(char_len(&capped) <= MAX_SUMMARY_CHARS);
        Ok(Self(capped))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.0)
    }
}

impl fmt::Display for ValidatedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedSummary {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
