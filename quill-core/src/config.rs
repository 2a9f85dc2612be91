//! Configuration management
//!
//! Settings live in `settings.json` inside the quill directory:
//! ```json
//! {
//!   "searchIndexUrl": "https://search.example.com",
//!   "newsletterUrl": "https://mail.example.com/subscribe",
//!   "newsletterListId": "weekly",
//!   "usernameSuffixAttempts": 10
//! }
//! ```
//! Keys quill does not know about are kept when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::user::is_web_url;
use crate::services::DEFAULT_SUFFIX_ATTEMPTS;

/// Overrides `searchIndexUrl`
pub const SEARCH_INDEX_URL_ENV: &str = "QUILL_SEARCH_INDEX_URL";

/// Overrides `newsletterUrl`
pub const NEWSLETTER_URL_ENV: &str = "QUILL_NEWSLETTER_URL";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search_index_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    newsletter_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    newsletter_list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username_suffix_attempts: Option<usize>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Quill configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub search_index_url: Option<String>,
    pub newsletter_url: Option<String>,
    pub newsletter_list_id: Option<String>,
    pub username_suffix_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_index_url: None,
            newsletter_url: None,
            newsletter_list_id: None,
            username_suffix_attempts: DEFAULT_SUFFIX_ATTEMPTS,
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

impl Config {
    /// Load config from the quill directory, then apply env overrides
    pub fn load(quill_dir: &Path) -> Result<Self> {
        let raw = read_settings(&quill_dir.join(SETTINGS_FILE))?;

        let config = Self {
            search_index_url: env_override(SEARCH_INDEX_URL_ENV).or(raw.search_index_url),
            newsletter_url: env_override(NEWSLETTER_URL_ENV).or(raw.newsletter_url),
            newsletter_list_id: raw.newsletter_list_id,
            username_suffix_attempts: raw
                .username_suffix_attempts
                .unwrap_or(DEFAULT_SUFFIX_ATTEMPTS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Endpoints must be absolute http(s) URLs
    pub fn validate(&self) -> std::result::Result<(), Error> {
        for (key, value) in [
            ("searchIndexUrl", &self.search_index_url),
            ("newsletterUrl", &self.newsletter_url),
        ] {
            if let Some(url) = value {
                if !is_web_url(url) {
                    return Err(Error::Config(format!("{} is not an http(s) URL: {}", key, url)));
                }
            }
        }
        Ok(())
    }

    /// Save config to the quill directory, keeping unknown keys
    pub fn save(&self, quill_dir: &Path) -> Result<()> {
        let path = quill_dir.join(SETTINGS_FILE);
        let mut settings = read_settings(&path)?;

        settings.search_index_url = self.search_index_url.clone();
        settings.newsletter_url = self.newsletter_url.clone();
        settings.newsletter_list_id = self.newsletter_list_id.clone();
        settings.username_suffix_attempts = Some(self.username_suffix_attempts);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.username_suffix_attempts, DEFAULT_SUFFIX_ATTEMPTS);
        assert!(config.newsletter_list_id.is_none());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"newsletterListId": "weekly", "theme": "dark"}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.newsletter_list_id.as_deref(), Some("weekly"));

        config.username_suffix_attempts = 3;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["theme"], "dark");
        assert_eq!(json["usernameSuffixAttempts"], 3);
        assert_eq!(json["newsletterListId"], "weekly");
    }

    #[test]
    fn test_endpoint_must_be_web_url() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"newsletterUrl": "mail.example.com"}"#,
        )
        .unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("newsletterUrl"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
