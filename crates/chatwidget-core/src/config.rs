use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::ai::gemini::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_STARTER: &str = "Hi! Help me plan a one-day trip around Taipei~";

pub fn default_suggestions() -> Vec<String> {
    vec![
        "Are there any free exhibitions in Taipei today?".to_string(),
        "Translate this into Chinese: Hello from Taipei!".to_string(),
        "Write a short poem about the MRT".to_string(),
    ]
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub default_model: Option<String>,
    pub starter: Option<String>,
    pub suggestions: Option<Vec<String>>,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            default_model: Some(DEFAULT_MODEL.to_string()),
            starter: Some(DEFAULT_STARTER.to_string()),
            suggestions: Some(default_suggestions()),
            api_base_url: None,
            request_timeout_secs: None,
            log_level: Some("info".to_string()),
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
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

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Starter text for the draft. An explicitly empty starter disables it.
    pub fn starter(&self) -> Option<&str> {
        match self.starter.as_deref() {
            Some("") => None,
            Some(s) => Some(s),
            None => Some(DEFAULT_STARTER),
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        self.suggestions.clone().unwrap_or_else(default_suggestions)
    }

    pub fn base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatwidget"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.starter(), Some(DEFAULT_STARTER));
        assert_eq!(config.suggestions().len(), 3);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_model": "gemini-2.5-pro", "request_timeout_secs": 30 }"#)
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model(), "gemini-2.5-pro");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn empty_starter_disables_prefill() {
        let config = Config {
            starter: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(config.starter(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.default_model = Some("gemini-2.5-flash-lite".into());
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap().model(), "gemini-2.5-flash-lite");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
