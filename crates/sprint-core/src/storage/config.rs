//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Countdown intervals and the random get-set toggle
//! - Vibration and audio feedback
//! - Tracking goal and calorie/step constants
//! - Sensor sampling options
//!
//! Configuration is stored at `<data dir>/config.toml`. The session never
//! reads this file itself; callers turn it into [`RunSettings`] and inject
//! that at construction.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::metrics::{DEFAULT_CALORIE_FACTOR_PER_METER, DEFAULT_STEP_THRESHOLD};
use crate::sensors::{Accuracy, LocationOptions};

pub const MARK_INTERVAL_RANGE: RangeInclusive<u32> = 3..=10;
pub const GET_SET_INTERVAL_RANGE: RangeInclusive<u32> = 1..=10;
const UTC_OFFSET_RANGE: RangeInclusive<i32> = -720..=840;

/// Countdown configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownSettings {
    #[serde(default = "default_mark_interval")]
    pub on_your_mark_interval_sec: u32,
    #[serde(default = "default_get_set_interval")]
    pub get_set_interval_sec: u32,
    /// Draw the get-set interval from 1..=10 at the start of every run.
    #[serde(default)]
    pub randomize_get_set: bool,
}

/// Cue feedback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSettings {
    #[serde(default = "default_true")]
    pub vibration_enabled: bool,
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
    #[serde(default = "default_mark_to_set_asset")]
    pub mark_to_set_asset: String,
    #[serde(default = "default_go_asset")]
    pub go_asset: String,
}

/// Live tracking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Stop the run automatically once this distance is covered.
    #[serde(default)]
    pub distance_goal_meters: Option<f64>,
    #[serde(default = "default_calorie_factor")]
    pub calorie_factor_per_meter: f64,
    #[serde(default = "default_step_threshold")]
    pub step_threshold: f64,
    /// Fixed seed for the random get-set draw (unset = entropy).
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Sensor sampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default = "default_accuracy")]
    pub accuracy: Accuracy,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_min_distance_m")]
    pub min_distance_m: f64,
    #[serde(default = "default_motion_update_interval_ms")]
    pub motion_update_interval_ms: u64,
}

/// Run history configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Offset applied to a run's start time to get its calendar date.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub countdown: CountdownSettings,
    #[serde(default)]
    pub feedback: FeedbackSettings,
    #[serde(default)]
    pub tracking: TrackingSettings,
    #[serde(default)]
    pub sensors: SensorSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

/// Validated, read-only settings for one run session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSettings {
    pub countdown: CountdownSettings,
    pub feedback: FeedbackSettings,
    pub tracking: TrackingSettings,
    pub sensors: SensorSettings,
    pub history: HistorySettings,
}

// Default functions
fn default_mark_interval() -> u32 {
    5
}
fn default_get_set_interval() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_mark_to_set_asset() -> String {
    "sounds/get-set.mp3".into()
}
fn default_go_asset() -> String {
    "sounds/starting-pistol.mp3".into()
}
fn default_calorie_factor() -> f64 {
    DEFAULT_CALORIE_FACTOR_PER_METER
}
fn default_step_threshold() -> f64 {
    DEFAULT_STEP_THRESHOLD
}
fn default_accuracy() -> Accuracy {
    Accuracy::Highest
}
fn default_min_interval_ms() -> u64 {
    1000
}
fn default_min_distance_m() -> f64 {
    1.0
}
fn default_motion_update_interval_ms() -> u64 {
    100
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            on_your_mark_interval_sec: default_mark_interval(),
            get_set_interval_sec: default_get_set_interval(),
            randomize_get_set: false,
        }
    }
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            vibration_enabled: true,
            audio_enabled: true,
            mark_to_set_asset: default_mark_to_set_asset(),
            go_asset: default_go_asset(),
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            distance_goal_meters: None,
            calorie_factor_per_meter: default_calorie_factor(),
            step_threshold: default_step_threshold(),
            random_seed: None,
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            accuracy: default_accuracy(),
            min_interval_ms: default_min_interval_ms(),
            min_distance_m: default_min_distance_m(),
            motion_update_interval_ms: default_motion_update_interval_ms(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { utc_offset_minutes: 0 }
    }
}

impl SensorSettings {
    pub fn location_options(&self) -> LocationOptions {
        LocationOptions {
            accuracy: self.accuracy,
            min_interval_ms: self.min_interval_ms,
            min_distance_m: self.min_distance_m,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(key, e.to_string()))?,
                    ),
                    // Optional numbers are null while unset.
                    serde_json::Value::Number(_) | serde_json::Value::Null => {
                        parse_number(key, value)?
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(key, e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of the config file in the default data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some("none".to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key without touching disk. The result
    /// must still pass [`Config::run_settings`].
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(key, e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.run_settings()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Validate and snapshot the settings a run session needs.
    pub fn run_settings(&self) -> Result<RunSettings, ConfigError> {
        let countdown = &self.countdown;
        if !MARK_INTERVAL_RANGE.contains(&countdown.on_your_mark_interval_sec) {
            return Err(invalid(
                "countdown.on_your_mark_interval_sec",
                format!("must be within {MARK_INTERVAL_RANGE:?} seconds"),
            ));
        }
        if !GET_SET_INTERVAL_RANGE.contains(&countdown.get_set_interval_sec) {
            return Err(invalid(
                "countdown.get_set_interval_sec",
                format!("must be within {GET_SET_INTERVAL_RANGE:?} seconds"),
            ));
        }

        let tracking = &self.tracking;
        if let Some(goal) = tracking.distance_goal_meters {
            if !goal.is_finite() || goal <= 0.0 {
                return Err(invalid("tracking.distance_goal_meters", "must be a positive distance"));
            }
        }
        if !tracking.calorie_factor_per_meter.is_finite() || tracking.calorie_factor_per_meter < 0.0 {
            return Err(invalid("tracking.calorie_factor_per_meter", "must be zero or positive"));
        }
        if !tracking.step_threshold.is_finite() || tracking.step_threshold <= 0.0 {
            return Err(invalid("tracking.step_threshold", "must be positive"));
        }

        if self.sensors.motion_update_interval_ms == 0 {
            return Err(invalid("sensors.motion_update_interval_ms", "must be at least 1"));
        }
        if !self.sensors.min_distance_m.is_finite() || self.sensors.min_distance_m < 0.0 {
            return Err(invalid("sensors.min_distance_m", "must be zero or positive"));
        }
        if !UTC_OFFSET_RANGE.contains(&self.history.utc_offset_minutes) {
            return Err(invalid(
                "history.utc_offset_minutes",
                format!("must be within {UTC_OFFSET_RANGE:?} minutes"),
            ));
        }

        Ok(RunSettings {
            countdown: self.countdown.clone(),
            feedback: self.feedback.clone(),
            tracking: self.tracking.clone(),
            sensors: self.sensors.clone(),
            history: self.history.clone(),
        })
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

fn parse_number(key: &str, value: &str) -> Result<serde_json::Value, ConfigError> {
    if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("null") {
        return Ok(serde_json::Value::Null);
    }
    if let Ok(n) = value.parse::<u64>() {
        return Ok(serde_json::Value::Number(n.into()));
    }
    if let Ok(n) = value.parse::<i64>() {
        return Ok(serde_json::Value::Number(n.into()));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .ok_or_else(|| invalid(key, format!("cannot parse '{value}' as number")))
}
