//! Configuration management for the Apolomics client

pub mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::progression::ProgressionSettings;

pub use session::Session;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the REST API, e.g. `http://localhost:8000/api`
    pub api_base_url: String,

    /// Authorization scheme placed before the token (`Token` or `Bearer`)
    pub auth_scheme: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Percentage viewed at which a lecture counts as watched
    pub watched_threshold_percent: f64,

    /// Playback progress is pushed once per step of this size
    pub progress_push_step_percent: f64,

    /// Interval between assignment review status checks
    pub review_poll_interval_secs: u64,

    /// Interval between certificate checks after a passed exam
    pub certificate_poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            auth_scheme: "Token".to_string(),
            request_timeout_secs: 30,
            watched_threshold_percent: 90.0,
            progress_push_step_percent: 25.0,
            review_poll_interval_secs: 5,
            certificate_poll_interval_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "apolomics")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "apolomics")
            .context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Per-request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Engine settings derived from this configuration
    pub fn progression_settings(&self) -> ProgressionSettings {
        ProgressionSettings {
            watched_threshold_percent: self.watched_threshold_percent.clamp(0.0, 100.0),
            progress_push_step_percent: self.progress_push_step_percent.clamp(0.0, 100.0),
            review_poll_interval: Duration::from_secs(self.review_poll_interval_secs.max(1)),
            certificate_poll_interval: Duration::from_secs(
                self.certificate_poll_interval_secs.max(1),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config_uses_ninety_percent_threshold() {
        let config = Config::default();
        assert_eq!(config.watched_threshold_percent, 90.0);
        assert_eq!(config.progress_push_step_percent, 25.0);
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let json = r#"{"api_base_url":"https://lms.test/api","watched_threshold_percent":80}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base_url, "https://lms.test/api");
        assert_eq!(config.watched_threshold_percent, 80.0);
        assert_eq!(config.auth_scheme, "Token");
        assert_eq!(config.review_poll_interval_secs, 5);
    }

    #[test]
    fn load_from_missing_path_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config { review_poll_interval_secs: 10, ..Config::default() };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn progression_settings_clamp_out_of_range_values() {
        let config = Config {
            watched_threshold_percent: 150.0,
            review_poll_interval_secs: 0,
            ..Config::default()
        };
        let settings = config.progression_settings();
        assert_eq!(settings.watched_threshold_percent, 100.0);
        assert_eq!(settings.review_poll_interval, Duration::from_secs(1));
    }
}
