//! Client configuration.
//!
//! Stored as TOML in the platform config directory
//! (`~/.config/pdf-qa/config.toml` on Linux). A missing file means defaults.
//! `PDF_QA_API_URL` overrides the configured backend URL.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const API_URL_ENV: &str = "PDF_QA_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Multipart field name the backend expects for uploaded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadField {
    /// Repeated `files` parts, one per document.
    #[default]
    Files,
    /// Single `file` part.
    File,
}

impl UploadField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadField::Files => "files",
            UploadField::File => "file",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub upload_field: UploadField,

    /// Largest accepted PDF, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_max_history_items")]
    pub max_history_items: usize,

    /// Overrides the location of the local history cache.
    #[serde(default)]
    pub history_path: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_history_items() -> usize {
    DEFAULT_MAX_HISTORY_ITEMS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            upload_field: UploadField::default(),
            max_file_size: default_max_file_size(),
            max_history_items: default_max_history_items(),
            history_path: None,
        }
    }
}

impl Config {
    /// Loads the config file if present and applies the environment override.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_api_url_override(std::env::var(API_URL_ENV).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.api_url = normalize_url(&config.api_url);
        Ok(config)
    }

    pub fn with_api_url_override(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = normalize_url(&url);
        }
        self
    }

    /// Where the local history cache lives.
    pub fn history_file(&self) -> PathBuf {
        self.history_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pdf-qa")
                .join("history.json")
        })
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pdf-qa").join("config.toml"))
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_expectations() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.upload_field, UploadField::Files);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.max_history_items, 50);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            api_url = "https://pdf.example.com/api/"
            upload_field = "file"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "https://pdf.example.com/api");
        assert_eq!(config.upload_field, UploadField::File);
        assert_eq!(config.max_history_items, DEFAULT_MAX_HISTORY_ITEMS);
    }

    #[test]
    fn env_override_wins_over_file() {
        let config = Config::from_toml_str("api_url = \"http://a\"")
            .unwrap()
            .with_api_url_override(Some("http://b:9000/".to_string()));
        assert_eq!(config.api_url, "http://b:9000");

        let unchanged = Config::default().with_api_url_override(Some("  ".to_string()));
        assert_eq!(unchanged.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("max_file_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_history_items = 5\nhistory_path = \"/tmp/h.json\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.max_history_items, 5);
        assert_eq!(config.history_file(), PathBuf::from("/tmp/h.json"));
    }
}
