//! # Sprint O' Clock Core Library
//!
//! The run timer behind Sprint O' Clock: a race-start countdown followed by
//! a tracked run that ends in a stored summary record. The CLI and any
//! device shell are thin hosts over this crate.
//!
//! ## Architecture
//!
//! - **Countdown**: "On Your Marks" / "Get Set" / "GO!" sequencing with
//!   audio and haptic cues
//! - **Sensors**: location and accelerometer subscriptions that forward
//!   samples into the session inbox
//! - **Metrics**: haversine distance, max speed, step detection, calories
//! - **Session**: a single-threaded state machine fed by timer ticks and
//!   sensor samples, plus an async driver and trace replay
//! - **Storage**: TOML configuration and SQLite run history
//!
//! ## Key Components
//!
//! - [`RunSession`]: countdown and tracking state machine
//! - [`CueSequencer`]: countdown phases
//! - [`RunMetrics`]: live metrics for the current run
//! - [`RunRecord`]: immutable summary of a finished run
//! - [`Database`]: run history persistence
//! - [`Config`]: application configuration management

pub mod countdown;
pub mod error;
pub mod events;
pub mod metrics;
pub mod sensors;
pub mod session;
pub mod storage;

pub use countdown::{CueKind, CueSequencer, Phase};
pub use error::{ConfigError, CoreError, CueError, DatabaseError, SensorError, StoreError};
pub use events::{Event, FinishReason};
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use session::{Collaborators, RunRecord, RunSession, SessionInput, SessionState};
pub use storage::{Config, Database, MemoryRecordStore, RunRecordStore, RunSettings};
