use std::fmt;

use url::Url;

/// Longest raw input accepted, counted in characters after trimming.
pub const MAX_URL_CHARS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UrlRejection {
    #[error("URL required")]
    Empty,
    #[error("URL too long")]
    TooLong,
    #[error("malformed URL")]
    Malformed,
    #[error("unsupported scheme")]
    UnsupportedScheme,
}

/// An absolute `http`/`https` URL that passed [`validate_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl(Url);

impl CandidateUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Checks run in order: presence, length, syntax, scheme.
pub fn validate_url(raw: &str) -> Result<CandidateUrl, UrlRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlRejection::Empty);
    }
    if trimmed.chars().count() > MAX_URL_CHARS {
        return Err(UrlRejection::TooLong);
    }
    let url = Url::parse(trimmed).map_err(|_| UrlRejection::Malformed)?;
    match url.scheme() {
        "http" | "https" => Ok(CandidateUrl(url)),
        _ => Err(UrlRejection::UnsupportedScheme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(validate_url(" \t\n"), Err(UrlRejection::Empty));
    }

    #[test]
    fn length_is_checked_before_syntax() {
        let raw = format!("not a url {}", "x".repeat(MAX_URL_CHARS));
        assert_eq!(validate_url(&raw), Err(UrlRejection::TooLong));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let url = validate_url("  https://example.com/a  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
    }
}
