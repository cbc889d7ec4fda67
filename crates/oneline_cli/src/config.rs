//! Optional RON settings file for the command-line front end.
//!
//! Every field may be omitted; missing ones keep the engine defaults.
//! Durations are given in milliseconds.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use oneline_engine::{ApiKey, EngineConfig};
use oneline_logging::oneline_info;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub fetch_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub generation_timeout_ms: Option<u64>,
    pub overall_timeout_ms: Option<u64>,
    pub redirect_limit: Option<usize>,
    pub max_body_bytes: Option<u64>,
    pub user_agent: Option<String>,
    pub model: Option<String>,
    pub api_base: Option<String>,
}

impl FileConfig {
    /// Reads and parses `path`. Unreadable or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        oneline_info!("Loaded settings from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Layers these settings over the engine defaults.
    pub fn into_engine_config(self, api_key: ApiKey) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.gemini.api_key = Some(api_key);

        if let Some(ms) = self.fetch_timeout_ms {
            config.fetch.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.fetch.connect_timeout = Duration::from_millis(ms);
            config.gemini.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.generation_timeout_ms {
            config.summarizer.attempt_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.overall_timeout_ms {
            config.pipeline.overall_timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = self.redirect_limit {
            config.fetch.redirect_limit = limit;
        }
        if let Some(bytes) = self.max_body_bytes {
            config.fetch.max_bytes = bytes;
        }
        if let Some(agent) = self.user_agent {
            config.fetch.user_agent = agent;
        }
        if let Some(model) = self.model {
            config.gemini.model = model;
        }
        if let Some(base) = self.api_base {
            config.gemini.api_base = base;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn key() -> ApiKey {
        ApiKey::new("k").unwrap()
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let parsed = FileConfig::parse("()").unwrap();
        assert_eq!(parsed, FileConfig::default());

        let config = parsed.into_engine_config(key());
        assert_eq!(config.fetch.redirect_limit, 5);
        assert_eq!(config.pipeline.overall_timeout, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fields_override_defaults() {
        let parsed = FileConfig::parse(
            r#"(
                fetch_timeout_ms: Some(2500),
                overall_timeout_ms: Some(9000),
                redirect_limit: Some(2),
                model: Some("gemini-pro"),
            )"#,
        )
        .unwrap();
        let config = parsed.into_engine_config(key());
        assert_eq!(config.fetch.timeout, Duration::from_millis(2500));
        assert_eq!(config.pipeline.overall_timeout, Duration::from_millis(9000));
        assert_eq!(config.fetch.redirect_limit, 2);
        assert_eq!(config.gemini.model, "gemini-pro");
        assert_eq!(config.summarizer.attempt_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(FileConfig::parse("(timeout: Some(1))").is_err());
    }

    #[test]
    fn load_reads_file_and_reports_missing_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oneline.ron");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "(max_body_bytes: Some(1024))").unwrap();

        let loaded = FileConfig::load(&path).unwrap();
        assert_eq!(loaded.max_body_bytes, Some(1024));

        let err = FileConfig::load(&dir.path().join("absent.ron")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
