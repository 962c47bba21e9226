//! Run settings.
//!
//! Everything a run needs is read from one TOML file: directories, download
//! options, the panel description and the event calendar. Every section is
//! optional and falls back to the built-in defaults.

use crate::error::{PipelineError, Result};
use macropanel_core::PanelConfig;
use macropanel_output::{PolicyEvent, default_events};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "macropanel.toml";

/// Directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Downloaded market and FRED tables
    pub raw_dir: PathBuf,
    /// User-supplied tables such as the Shiller export
    pub external_dir: PathBuf,
    /// Panel, events and run summary
    pub processed_dir: PathBuf,
    /// File stem of the panel files
    pub panel_stem: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            external_dir: PathBuf::from("data/external"),
            processed_dir: PathBuf::from("data/processed"),
            panel_stem: "monthly_data".to_string(),
        }
    }
}

impl PathsConfig {
    /// Panel file path with the given extension.
    pub fn panel_path(&self, extension: &str) -> PathBuf {
        self.processed_dir
            .join(format!("{}.{extension}", self.panel_stem))
    }
}

/// Download options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Pause after each request, in milliseconds
    pub rate_limit_ms: u64,
    /// Environment variable holding the FRED API key
    pub fred_api_key_env: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 1000,
            fred_api_key_env: macropanel_data::fred::FRED_API_KEY_ENV.to_string(),
        }
    }
}

/// Complete run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory layout
    pub paths: PathsConfig,
    /// Download options
    pub download: DownloadConfig,
    /// Panel description
    pub panel: PanelConfig,
    /// Policy events annotated on the panel
    pub events: Vec<PolicyEvent>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            download: DownloadConfig::default(),
            panel: PanelConfig::default(),
            events: default_events(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, using the defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or if the result does not
    /// validate.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "settings file not found, using defaults");
            let settings = Self::default();
            settings.validate()?;
            return Ok(settings);
        }
        let text = fs::read_to_string(path)?;
        let settings = Self::from_toml(&text)?;
        info!(path = %path.display(), series = settings.panel.series.len(), "settings loaded");
        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or invalid settings.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Check the panel description and the directory layout.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        self.panel.validate()?;
        if self.paths.panel_stem.trim().is_empty() {
            return Err(PipelineError::Config("panel_stem must not be empty".to_string()));
        }
        if let Some(e) = self.events.iter().find(|e| e.name.trim().is_empty()) {
            return Err(PipelineError::Config(format!("event on {} has no name", e.date)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.paths.panel_path("csv"), PathBuf::from("data/processed/monthly_data.csv"));
        assert_eq!(settings.events.len(), 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let text = r#"
            [paths]
            processed_dir = "out"

            [panel.date_range]
            start = "2010-01-01"
            end = "2020-12-31"
        "#;
        let settings = Settings::from_toml(text).unwrap();
        assert_eq!(settings.paths.processed_dir, PathBuf::from("out"));
        assert_eq!(settings.paths.raw_dir, PathBuf::from("data/raw"));
        assert_eq!(settings.panel.base_series, "sp500");
        assert_eq!(settings.panel.date_range.start.to_string(), "2010-01-01");
        assert_eq!(settings.download.rate_limit_ms, 1000);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let text = r#"
            [panel.date_range]
            start = "2020-01-01"
            end = "2010-01-01"
        "#;
        assert!(matches!(
            Settings::from_toml(text),
            Err(PipelineError::Panel(ref e)) if e.is_config()
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(Settings::from_toml("paths = ["), Err(PipelineError::Toml(_))));
    }

    #[test]
    fn test_round_trip() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
