use std::fmt;
use std::time::Duration;

use crate::fetch::FetchSettings;
use crate::gemini::GeminiSettings;
use crate::generate::SummarizerSettings;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API credential is missing or blank")]
    MissingCredential,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Server-held credential for the text-generation API.
///
/// `Debug` is redacted so the key can't end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Spans fetch, extraction and summarization together.
    pub overall_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_secs(15),
        }
    }
}

/// Everything needed to build a [`crate::Pipeline`] with the default collaborators.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub gemini: GeminiSettings,
    pub summarizer: SummarizerSettings,
    pub pipeline: PipelineSettings,
}

impl EngineConfig {
    /// Rejects settings that would make every run fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("fetch timeout", self.fetch.timeout),
            ("generation timeout", self.summarizer.attempt_timeout),
            ("overall timeout", self.pipeline.overall_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::InvalidSetting(format!("{name} must be positive")));
        }
        if self.fetch.max_bytes == 0 {
            return Err(ConfigError::InvalidSetting("max_bytes must be positive".into()));
        }
        if self.gemini.model.trim().is_empty() {
            return Err(ConfigError::InvalidSetting("model name is empty".into()));
        }
        if self.gemini.api_key.is_none() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("  secret-value ").unwrap();
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert_eq!(key.expose(), "secret-value");
    }

    #[test]
    fn blank_api_key_is_missing() {
        assert_eq!(ApiKey::new("   "), Err(ConfigError::MissingCredential));
    }

    #[test]
    fn validate_requires_credential() {
        let mut config = EngineConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingCredential));
        config.gemini.api_key = Some(ApiKey::new("k").unwrap());
        assert_eq!(config.validate(), Ok(()));
        config.pipeline.overall_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSetting(_))));
    }
}
