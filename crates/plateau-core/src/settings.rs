//! Persistent user settings for Plateau
//!
//! Settings are stored in a TOML configuration file at:
//! - Linux: `~/.config/plateau/plateau_config.toml`
//! - macOS: `~/Library/Application Support/plateau/plateau_config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [steady_state]
//! window_size = 5
//! max_rounds = 25
//! excursion_rule = "range"
//! excursion_pct = 0.2
//! slope_span = "full"
//! slope_pct = 0.1
//!
//! [fio]
//! binary = "fio"
//! runtime_secs = 60
//! iodepth = 32
//! numjobs = 1
//! ioengine = "libaio"
//!
//! [array]
//! poll_interval_ms = 1000
//! ready_timeout_secs = 600
//! assume_clean = true
//!
//! [output]
//! json = false
//! ```
//!
//! `excursion_pct` bounds both excursion rules. Under `"range"` the spread
//! between the highest and lowest window values may not exceed that fraction
//! of the average; under `"band"` every value must lie within that fraction
//! of the average, so `0.1` allows each round to stray ±10%.
//!
//! Redundant arrays (RAID 1, 5, 6, 10) are recreated with `--assume-clean`
//! unless `assume_clean = false`. The members have just been erased, so the
//! mirrors and parity already agree. With `assume_clean = false` the array
//! runs its initial resync before it counts as ready, and `ready_timeout_secs`
//! must cover that resync on the full member capacity.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, DEFAULT_MAX_ROUNDS, DEFAULT_WINDOW_SIZE};
use crate::steady::{
    ExcursionRule, SlopeSpan, SteadyStateCriteria, DEFAULT_EXCURSION_PCT, DEFAULT_SLOPE_PCT,
};

/// Configuration file name
const CONFIG_FILE_NAME: &str = "plateau_config.toml";

/// Application name for config directory
const APP_NAME: &str = "plateau";

/// User settings loaded from configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Steady-state detection settings
    pub steady_state: SteadyStateSettings,

    /// Workload generator settings
    pub fio: FioSettings,

    /// RAID array settings
    pub array: ArraySettings,

    /// Output settings
    pub output: OutputSettings,
}

/// Settings for round budgeting and the steady-state thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SteadyStateSettings {
    /// Rounds in the measurement window
    pub window_size: usize,

    /// Maximum rounds per test
    pub max_rounds: usize,

    /// Excursion rule ("range" or "band")
    pub excursion_rule: ExcursionRule,

    /// Allowed excursion as a fraction of the average
    ///
    /// Bounds the max-min spread under "range" and the distance of each
    /// value from the average under "band".
    pub excursion_pct: f64,

    /// Slope projection span ("full" or "half")
    pub slope_span: SlopeSpan,

    /// Allowed slope excursion as a fraction of the average
    pub slope_pct: f64,
}

/// Settings for the fio workload generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FioSettings {
    /// Path or name of the fio binary
    pub binary: String,

    /// Runtime of each trial in seconds
    pub runtime_secs: u64,

    /// Outstanding I/O per job
    pub iodepth: u32,

    /// Number of parallel jobs
    pub numjobs: u32,

    /// fio I/O engine
    pub ioengine: String,
}

/// Settings for array recreation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArraySettings {
    /// Interval between readiness polls in milliseconds
    pub poll_interval_ms: u64,

    /// Maximum wait for the array to become ready in seconds
    ///
    /// Includes the initial resync when `assume_clean` is false.
    pub ready_timeout_secs: u64,

    /// Skip the initial resync of redundant levels after an erase
    pub assume_clean: bool,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Output reports in JSON format by default
    pub json: bool,
}

impl Default for SteadyStateSettings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_rounds: DEFAULT_MAX_ROUNDS,
            excursion_rule: ExcursionRule::default(),
            excursion_pct: DEFAULT_EXCURSION_PCT,
            slope_span: SlopeSpan::default(),
            slope_pct: DEFAULT_SLOPE_PCT,
        }
    }
}

impl Default for FioSettings {
    fn default() -> Self {
        Self {
            binary: "fio".to_string(),
            runtime_secs: 60,
            iodepth: 32,
            numjobs: 1,
            ioengine: "libaio".to_string(),
        }
    }
}

impl Default for ArraySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            ready_timeout_secs: 600,
            assume_clean: true,
        }
    }
}

impl Settings {
    /// Load settings from the configuration file
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config path available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to read config file {:?}: {}", path, e);
                return Self::default();
            }
        };

        match Self::from_toml(&contents) {
            Ok(settings) => {
                tracing::debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Parse settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        toml::from_str(contents).map_err(SettingsError::Deserialize)
    }

    /// Save settings to the configuration file
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        self.save_to_path(Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.ok_or(SettingsError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, contents).map_err(|e| SettingsError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Build the runtime configuration these settings describe
    pub fn to_config(&self) -> Config {
        let ss = &self.steady_state;
        Config::new()
            .window_size(ss.window_size)
            .max_rounds(ss.max_rounds)
            .criteria(SteadyStateCriteria {
                excursion_rule: ss.excursion_rule,
                excursion_pct: ss.excursion_pct,
                slope_span: ss.slope_span,
                slope_pct: ss.slope_pct,
            })
            .poll_interval(Duration::from_millis(self.array.poll_interval_ms))
            .ready_timeout(Duration::from_secs(self.array.ready_timeout_secs))
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Get the path to the configuration directory
    pub fn config_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME))
    }

    /// Check if a configuration file exists
    pub fn config_exists() -> bool {
        Self::config_path().is_some_and(|p| p.exists())
    }

    /// Generate a default configuration file content as a string
    pub fn default_config_string() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }
}

/// Errors that can occur when working with settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No configuration directory available
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read or write config file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    /// Failed to deserialize settings
    #[error("Failed to parse settings: {0}")]
    Deserialize(toml::de::Error),
}
