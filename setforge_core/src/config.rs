//! Configuration file support for SetForge.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/setforge/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub rest: RestConfig,

    #[serde(default)]
    pub timer: TimerConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Global rest defaults, the last stop of the override chain
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestConfig {
    /// Rest between straight sets when neither the block nor the template
    /// sets one.
    #[serde(default = "default_between_sets_sec")]
    pub between_sets_sec: u32,

    /// Rest between blocks when the block sets no transition override.
    #[serde(default = "default_transition_sec")]
    pub transition_sec: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            between_sets_sec: default_between_sets_sec(),
            transition_sec: default_transition_sec(),
        }
    }
}

/// Rest-countdown and crash-snapshot cadence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Poll interval for the rest countdown display.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Remaining time at which the rest-ending cue fires.
    #[serde(default = "default_cue_threshold_sec")]
    pub cue_threshold_sec: u32,

    /// How often an active session writes its crash-recovery snapshot.
    #[serde(default = "default_snapshot_interval_sec")]
    pub snapshot_interval_sec: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            cue_threshold_sec: default_cue_threshold_sec(),
            snapshot_interval_sec: default_snapshot_interval_sec(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME")
            .expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("setforge")
}

fn default_between_sets_sec() -> u32 {
    90
}

fn default_transition_sec() -> u32 {
    60
}

fn default_tick_ms() -> u64 {
    250
}

fn default_cue_threshold_sec() -> u32 {
    3
}

fn default_snapshot_interval_sec() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME")
                .expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("setforge").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
