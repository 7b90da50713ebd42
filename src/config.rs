//! Persisted tracker settings. The record is tiny and rewritten wholesale on every change.

use std::{fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_TARGET: &str = "Photoshop";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// What to track and under which title to save it. The key names match files written by older
/// versions of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Case-insensitive substring of the foreground window title. Empty means always track.
    #[serde(rename = "target_window", default = "default_target")]
    pub target_pattern: String,
    /// Ledger column the session is saved under. Empty means untitled.
    #[serde(rename = "timer_title", default)]
    pub session_title: String,
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            target_pattern: default_target(),
            session_title: String::new(),
        }
    }
}

impl TrackingConfig {
    pub fn new(target_pattern: &str, session_title: &str) -> Self {
        Self {
            target_pattern: target_pattern.trim().to_string(),
            session_title: session_title.trim().to_string(),
        }
    }

    pub fn is_always_on(&self) -> bool {
        self.target_pattern.trim().is_empty()
    }

    pub fn title(&self) -> Option<&str> {
        let title = self.session_title.trim();
        (!title.is_empty()).then_some(title)
    }
}

impl Display for TrackingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_always_on() {
            write!(f, "Tracking: All Windows (Always On)")?;
        } else {
            write!(f, "Tracking: {}", self.target_pattern.trim())?;
        }
        match self.title() {
            Some(title) => write!(f, " | Title: {title}"),
            None => write!(f, " | Title: (untitled)"),
        }
    }
}

/// Storage for [TrackingConfig]. `load` never fails, an unreadable record falls back to defaults.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore {
    fn load(&self) -> TrackingConfig;

    fn save(&self, config: &TrackingConfig) -> Result<(), ConfigError>;
}

/// [ConfigStore] backed by a JSON file.
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<TrackingConfig, ConfigError> {
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> TrackingConfig {
        match self.read() {
            Ok(config) => {
                debug!("Loaded config {config:?} from {:?}", self.path);
                config
            }
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", self.path);
                TrackingConfig::default()
            }
            Err(e) => {
                warn!("Config at {:?} is unreadable, using defaults: {e}", self.path);
                TrackingConfig::default()
            }
        }
    }

    fn save(&self, config: &TrackingConfig) -> Result<(), ConfigError> {
        let data = serde_json::to_string(config)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}
