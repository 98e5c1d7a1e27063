//! Runtime configuration.
//!
//! Settings come from a JSON file: an explicit `--config` path, or
//! `settings.json` in the platform config directory. Every field has a
//! default, so a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parsers::ndt::{
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_MAX_SNAPSHOTS, DEFAULT_SMALL_PAYLOAD_BYTES,
    DEFAULT_SUSPICIOUS_PAYLOAD_BYTES,
};
use crate::parsers::ParserLimits;

/// Variable table used when no `schema_path` is configured
pub const DEFAULT_SCHEMA: &str = include_str!("../assets/snapshot-schema.txt");

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write settings: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// ETL settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlSettings {
    /// Settings file version for migration support
    pub version: u32,
    /// Table label used for counters
    pub table: String,
    pub max_snapshots: usize,
    pub max_payload_bytes: usize,
    pub small_payload_bytes: usize,
    pub suspicious_payload_bytes: usize,
    /// Variable table to use instead of the built-in one
    pub schema_path: Option<PathBuf>,
    /// Worker threads; 0 lets rayon decide
    pub workers: usize,
}

impl Default for EtlSettings {
    fn default() -> Self {
        Self {
            version: 1,
            table: "ndt".to_string(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            small_payload_bytes: DEFAULT_SMALL_PAYLOAD_BYTES,
            suspicious_payload_bytes: DEFAULT_SUSPICIOUS_PAYLOAD_BYTES,
            schema_path: None,
            workers: 0,
        }
    }
}

impl EtlSettings {
    /// Get the config directory path
    pub fn get_config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir().map(|p| p.join("snaplog-etl"))
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir().map(|p| p.join("snaplog-etl"))
        }
    }

    /// Get the path to the settings JSON file
    pub fn get_settings_path() -> Option<PathBuf> {
        Self::get_config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the config directory.
    /// A missing or unreadable file gives the defaults.
    pub fn load() -> Self {
        let path = match Self::get_settings_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject limits the parser cannot work with
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_snapshots == 0 {
            return Err(SettingsError::Invalid {
                field: "max_snapshots",
                reason: "must be at least 1",
            });
        }
        if self.max_payload_bytes == 0 {
            return Err(SettingsError::Invalid {
                field: "max_payload_bytes",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::get_settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Text of the variable table: `schema_path` if set, else the built-in one
    pub fn schema_text(&self) -> Result<String, SettingsError> {
        match &self.schema_path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
                path: path.clone(),
                source,
            }),
            None => Ok(DEFAULT_SCHEMA.to_string()),
        }
    }

    pub fn limits(&self) -> ParserLimits {
        ParserLimits {
            max_snapshots: self.max_snapshots,
            max_payload_bytes: self.max_payload_bytes,
            small_payload_bytes: self.small_payload_bytes,
            suspicious_payload_bytes: self.suspicious_payload_bytes,
        }
    }
}
