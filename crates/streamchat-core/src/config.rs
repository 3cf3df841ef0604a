use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::payload::DEFAULT_MODEL;
use crate::transport::DEFAULT_ENDPOINT;

/// Errors from loading or saving the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// User settings. The API key is deliberately not part of it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the server that serves `/api/chat`.
    pub endpoint: String,
    pub default_model: Option<String>,
    /// Prefills the developer message field.
    pub developer_message: Option<String>,
    /// Upper bound for a whole request cycle; no limit when unset.
    pub timeout_secs: Option<u64>,
    /// Fail the stream on invalid UTF-8 instead of substituting U+FFFD.
    pub strict_utf8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_model: None,
            developer_message: None,
            timeout_secs: None,
            strict_utf8: false,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    pub fn model(&self) -> &str {
        self.default_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("streamchat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            endpoint: "http://chat.internal:8080".to_string(),
            default_model: Some("gpt-4.1-nano".to_string()),
            developer_message: Some("You are a helpful assistant.".to_string()),
            timeout_secs: Some(45),
            strict_utf8: true,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_model": "gpt-3.5-turbo" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model(), "gpt-3.5-turbo");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.strict_utf8);
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = Config {
            timeout_secs: Some(0),
            ..Config::new()
        };
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
