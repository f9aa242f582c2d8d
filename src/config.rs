//! Configuration management for cuerig
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.cuerig/config.json` and is injected into the
//! harness as a plain value; nothing below reads it from a global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current config schema version
pub const CURRENT_VERSION: u32 = 1;

/// Errors raised while loading, saving or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem access failed
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the config schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The stored schema version has no migration path
    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    /// A value is out of range or contradicts another value
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Classifier label names for each gesture
    pub labels: LabelConfig,
    /// Debounce thresholds and monitor pacing
    pub debounce: DebounceConfig,
    /// External device notification settings
    pub notification: NotificationConfig,
    /// Arm homing settings
    pub homing: HomingConfig,
    /// Episode recording settings
    pub recording: RecordingConfig,
    /// Fixed-timer fallback used when no vision pipeline is available
    pub fallback: FallbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            labels: LabelConfig::default(),
            debounce: DebounceConfig::default(),
            notification: NotificationConfig::default(),
            homing: HomingConfig::default(),
            recording: RecordingConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// Classifier label names mapped to gestures
///
/// Matching is exact after trimming and lower-casing, so `"mouth_open"` does
/// not silently match `"open"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Labels that start an episode
    pub open: Vec<String>,
    /// Labels that count towards the stop confirmation
    pub chip: Vec<String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            open: vec!["open".to_string()],
            chip: vec!["chip".to_string()],
        }
    }
}

/// Debounce thresholds (all in milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// How long an uninterrupted chip run must last before it is confirmed
    pub chip_confirm_ms: u64,
    /// Delay between confirmation and the episode stop request
    pub stop_after_confirm_ms: u64,
    /// Pacing delay between monitor cycles
    pub poll_interval_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            chip_confirm_ms: 3000,
            stop_after_confirm_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl DebounceConfig {
    /// Chip run length needed to confirm
    pub fn chip_confirm(&self) -> Duration {
        Duration::from_millis(self.chip_confirm_ms)
    }

    /// Delay from confirmation to the stop request
    pub fn stop_after_confirm(&self) -> Duration {
        Duration::from_millis(self.stop_after_confirm_ms)
    }

    /// Monitor cycle pacing
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// External device notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Address of the device receiving the counter value
    pub device_address: String,
    /// Counter value before the first confirmation
    pub initial_value: u64,
    /// Amount added to the counter on every confirmation
    pub increment: u64,
    /// Send the initial value once at startup
    pub announce_on_start: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            device_address: "34:B7:DA:5E:81:15".to_string(),
            initial_value: 100,
            increment: 40,
            announce_on_start: true,
        }
    }
}

/// Arm homing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Number of interpolated poses sent on the way home
    pub steps: u32,
    /// Delay after each pose in milliseconds
    pub step_delay_ms: u64,
    /// Target joint angles in degrees, keyed by joint name
    pub home_pose: BTreeMap<String, f64>,
}

impl Default for HomingConfig {
    fn default() -> Self {
        let home_pose = [
            ("shoulder_pan.pos", -54.05),
            ("shoulder_lift.pos", -86.62),
            ("elbow_flex.pos", 99.82),
            ("wrist_flex.pos", 32.17),
            ("wrist_roll.pos", -2.72),
            ("gripper.pos", 68.19),
        ]
        .into_iter()
        .map(|(joint, deg)| (joint.to_string(), deg))
        .collect();

        Self {
            steps: 15,
            step_delay_ms: 100,
            home_pose,
        }
    }
}

impl HomingConfig {
    /// Pause between homing steps
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

/// Episode recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Control loop rate while recording
    pub fps: u32,
    /// Upper bound on a single episode
    pub episode_time_secs: u64,
    /// Task description stored with each episode
    pub task_description: String,
    /// Prefix of the dataset identifier; a launch timestamp is appended
    pub dataset_prefix: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            episode_time_secs: 60,
            task_description: "potato system release".to_string(),
            dataset_prefix: "eval_record".to_string(),
        }
    }
}

impl RecordingConfig {
    /// Episode time limit
    pub fn episode_time(&self) -> Duration {
        Duration::from_secs(self.episode_time_secs)
    }

    /// Interval between recorded frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.fps.max(1)))
    }

    /// Dataset identifier stamped with the given launch time
    pub fn dataset_id<Tz>(&self, launched_at: &chrono::DateTime<Tz>) -> String
    where
        Tz: chrono::TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}-{}",
            self.dataset_prefix,
            launched_at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Fixed-timer fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Delay before the simulated open gesture
    pub open_delay_ms: u64,
    /// Delay between the simulated open and the stop request
    pub stop_delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            open_delay_ms: 3000,
            stop_delay_ms: 2000,
        }
    }
}

impl FallbackConfig {
    /// Fallback wait before starting an episode
    pub fn open_delay(&self) -> Duration {
        Duration::from_millis(self.open_delay_ms)
    }

    /// Fallback wait before ending an episode
    pub fn stop_delay(&self) -> Duration {
        Duration::from_millis(self.stop_delay_ms)
    }
}

impl Config {
    /// Check ranges and cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification.increment == 0 {
            return Err(ConfigError::Invalid(
                "notification.increment must be greater than 0".to_string(),
            ));
        }
        if self.homing.steps == 0 {
            return Err(ConfigError::Invalid(
                "homing.steps must be greater than 0".to_string(),
            ));
        }
        if self.recording.fps == 0 {
            return Err(ConfigError::Invalid(
                "recording.fps must be greater than 0".to_string(),
            ));
        }
        if self.debounce.chip_confirm_ms == 0
            || self.debounce.stop_after_confirm_ms == 0
            || self.debounce.poll_interval_ms == 0
        {
            return Err(ConfigError::Invalid(
                "debounce thresholds and poll interval must be greater than 0".to_string(),
            ));
        }
        if self.labels.open.is_empty() || self.labels.chip.is_empty() {
            return Err(ConfigError::Invalid(
                "labels.open and labels.chip must each name at least one label".to_string(),
            ));
        }

        let normalise = |s: &String| s.trim().to_lowercase();
        if let Some(clash) = self
            .labels
            .open
            .iter()
            .map(normalise)
            .find(|open| self.labels.chip.iter().map(normalise).any(|c| &c == open))
        {
            return Err(ConfigError::Invalid(format!(
                "label {:?} is mapped to both open and chip",
                clash
            )));
        }

        Ok(())
    }
}

/// Get the path to the config file (~/.cuerig/config.json)
pub fn get_config_path() -> PathBuf {
    home_dir_or_fallback().join(".cuerig").join("config.json")
}

/// Get the path to the log directory (~/.cuerig/logs)
pub fn get_log_dir() -> PathBuf {
    home_dir_or_fallback().join(".cuerig").join("logs")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from the default location
pub fn load() -> Result<Config, ConfigError> {
    load_from(&get_config_path())
}

/// Load configuration from `path`, migrating and validating it
///
/// A missing file yields the defaults. A migrated file is written back.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = serde_json::from_str(&contents)?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;
    if migrated.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            migrated.version
        );
        save_to(path, &migrated)?;
    }

    migrated.validate()?;
    Ok(migrated)
}

/// Save configuration to `path`, creating parent directories
pub fn save_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
    }

    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents).map_err(io_err)?;

    tracing::info!("Config saved to {}", path.display());
    Ok(())
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, ConfigError> {
    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }
    if config.version > CURRENT_VERSION {
        return Err(ConfigError::UnknownVersion(config.version));
    }
    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, ConfigError> {
    match config.version {
        // Version 0 -> 1: first versioned schema, no field changes
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}
