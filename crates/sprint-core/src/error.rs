//! Core error types for sprint-core.
//!
//! Only [`SensorError`] with a fatal kind ever aborts a run; every other
//! failure here has a degraded-continuation path and is logged by the caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::sensors::SensorKind;

/// Core error type for sprint-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A sensor refused to start and the run was aborted.
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// The run history store rejected an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Failures reported synchronously by a sensor collaborator's `start` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The platform refused access to the sensor.
    #[error("permission denied for {sensor} sensor")]
    PermissionDenied { sensor: SensorKind },

    /// The device has no such sensor, or it is switched off.
    #[error("{sensor} sensor unavailable")]
    Unavailable { sensor: SensorKind },

    /// The collaborator rejected the subscription request.
    #[error("{sensor} sensor rejected subscription: {message}")]
    Rejected { sensor: SensorKind, message: String },
}

impl SensorError {
    pub fn sensor(&self) -> SensorKind {
        match self {
            SensorError::PermissionDenied { sensor }
            | SensorError::Unavailable { sensor }
            | SensorError::Rejected { sensor, .. } => *sensor,
        }
    }

    /// Whether this failure aborts the run. An unavailable sensor only
    /// degrades the metrics it feeds.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SensorError::Unavailable { .. })
    }
}

/// Audio cue failures. Always logged, never propagated past the cue player.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CueError {
    #[error("failed to load audio asset '{asset}': {message}")]
    AssetLoad { asset: String, message: String },

    #[error("failed to play audio cue: {0}")]
    Playback(String),
}

/// Run history store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The store refused the write (offline, quota, etc.).
    #[error("store rejected the operation: {0}")]
    Rejected(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored row could not be decoded back into a run record.
    #[error("Corrupt row {id}: {message}")]
    CorruptRow { id: i64, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The data directory could not be resolved or created.
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_sensors_degrade() {
        let denied = SensorError::PermissionDenied {
            sensor: SensorKind::Location,
        };
        let missing = SensorError::Unavailable {
            sensor: SensorKind::Motion,
        };
        let rejected = SensorError::Rejected {
            sensor: SensorKind::Location,
            message: "busy".into(),
        };
        assert!(denied.is_fatal());
        assert!(rejected.is_fatal());
        assert!(!missing.is_fatal());
        assert_eq!(missing.sensor(), SensorKind::Motion);
    }

    #[test]
    fn sensor_errors_render_the_sensor_name() {
        let err = SensorError::PermissionDenied {
            sensor: SensorKind::Location,
        };
        assert_eq!(err.to_string(), "permission denied for location sensor");
    }
}
