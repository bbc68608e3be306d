mod config;
pub mod database;
mod store;

pub use config::{
    Config, CountdownSettings, FeedbackSettings, HistorySettings, RunSettings, SensorSettings,
    TrackingSettings, GET_SET_INTERVAL_RANGE, MARK_INTERVAL_RANGE,
};
pub use database::{Database, HistoryStats, StoredRun};
pub use store::{MemoryRecordStore, RunRecordStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `SPRINT_OCLOCK_DATA_DIR` overrides the location outright. Otherwise it is
/// `~/.config/sprint-oclock[-dev]/`, with the `-dev` suffix selected by
/// `SPRINT_OCLOCK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("SPRINT_OCLOCK_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SPRINT_OCLOCK_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("sprint-oclock-dev")
            } else {
                base_dir.join("sprint-oclock")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
