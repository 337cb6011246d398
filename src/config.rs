use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::debounce::DEFAULT_SEARCH_DEBOUNCE;
use crate::github::GITHUB_API_BASE_URL;
use crate::openai::{DEFAULT_MODEL, OPENAI_API_BASE_URL};

const DEFAULT_CREDENTIALS_PATH: &str = ".commit-digest/credentials.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    Mock,
    OpenAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    GitHub,
    Fixture,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub github_api_base_url: String,
    pub openai_api_base_url: String,
    pub openai_model: String,
    pub credentials_path: PathBuf,
    pub search_debounce: Duration,
    pub summary_mode: SummaryMode,
    pub data_source: DataSource,
    pub github_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub repository: Option<String>,
    pub search_query: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let search_debounce = match get("SEARCH_DEBOUNCE_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "SEARCH_DEBOUNCE_MS",
                    value: raw.clone(),
                    message: e.to_string(),
                }
            })?),
            None => DEFAULT_SEARCH_DEBOUNCE,
        };

        let summary_mode = match get("SUMMARY_MODE").as_deref().map(str::trim) {
            None | Some("mock") => SummaryMode::Mock,
            Some("openai") => SummaryMode::OpenAi,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SUMMARY_MODE",
                    value: other.to_string(),
                    message: "expected 'mock' or 'openai'".into(),
                })
            }
        };

        let data_source = match get("DATA_SOURCE").as_deref().map(str::trim) {
            None | Some("github") => DataSource::GitHub,
            Some("fixture") => DataSource::Fixture,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "DATA_SOURCE",
                    value: other.to_string(),
                    message: "expected 'github' or 'fixture'".into(),
                })
            }
        };

        Ok(Self {
            github_api_base_url: get("GITHUB_API_BASE_URL")
                .unwrap_or_else(|| GITHUB_API_BASE_URL.into()),
            openai_api_base_url: get("OPENAI_API_BASE_URL")
                .unwrap_or_else(|| OPENAI_API_BASE_URL.into()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            credentials_path: get("CREDENTIALS_PATH")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.into())
                .into(),
            search_debounce,
            summary_mode,
            data_source,
            github_token: get("GITHUB_TOKEN"),
            openai_api_key: get("OPENAI_API_KEY"),
            repository: get("REPOSITORY"),
            search_query: get("SEARCH_QUERY"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.github_api_base_url, "https://api.github.com");
        assert_eq!(cfg.openai_api_base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.openai_model, "gpt-5-mini");
        assert_eq!(cfg.search_debounce, Duration::from_millis(500));
        assert_eq!(cfg.summary_mode, SummaryMode::Mock);
        assert_eq!(cfg.data_source, DataSource::GitHub);
        assert_eq!(
            cfg.credentials_path,
            PathBuf::from(".commit-digest/credentials.json")
        );
        assert!(cfg.github_token.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("SEARCH_DEBOUNCE_MS", "250"),
            ("SUMMARY_MODE", "openai"),
            ("DATA_SOURCE", "fixture"),
            ("GITHUB_TOKEN", "ghp"),
            ("REPOSITORY", ""),
        ])
        .unwrap();
        assert_eq!(cfg.search_debounce, Duration::from_millis(250));
        assert_eq!(cfg.summary_mode, SummaryMode::OpenAi);
        assert_eq!(cfg.data_source, DataSource::Fixture);
        assert_eq!(cfg.github_token.as_deref(), Some("ghp"));
        assert_eq!(cfg.repository, None);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = config(&[("SEARCH_DEBOUNCE_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("SEARCH_DEBOUNCE_MS"), "{err}");

        let err = config(&[("SUMMARY_MODE", "llama")]).unwrap_err();
        assert!(err.to_string().contains("llama"), "{err}");
    }
}
