//! Oneline core: pure input validation, text normalization and summary format rules.
mod format;
mod summary;
mod text;
mod url_input;

pub use format::{
    clean_model_output, contains_japanese, enforce_max_chars, has_forbidden_content,
    is_single_sentence, validate_format, FormatViolation, MAX_SUMMARY_CHARS,
};
pub use summary::ValidatedSummary;
pub use text::{char_len, normalize_whitespace, truncate_for_model};
pub use url_input::{validate_url, CandidateUrl, UrlRejection, MAX_URL_CHARS};
