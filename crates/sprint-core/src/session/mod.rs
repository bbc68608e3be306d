//! Run session orchestration.
//!
//! A [`RunSession`] owns one run from the first countdown tick to the
//! stored [`RunRecord`]. It is single-threaded: timer ticks, sensor samples
//! and stop requests all arrive as [`SessionInput`] messages and are
//! applied one at a time, so metrics never see concurrent writers.

mod clock;
pub mod driver;
mod record;
pub mod replay;
mod run;

use serde::{Deserialize, Serialize};

use crate::sensors::{GeoSample, MotionSample};

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{drive, STOPWATCH_TICK_MS};
pub use record::{format_elapsed, parse_elapsed, RunRecord};
pub use replay::{replay, replay_realtime, ReplayOutcome, SensorTrace, TraceEntry};
pub use run::{Collaborators, RunSession};

/// Lifecycle of a session. A finished run hands over its record in
/// [`Event::RunFinished`](crate::Event::RunFinished) and the session is
/// `Idle` again before the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Countdown,
    Tracking,
}

/// Everything a session reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// One second of countdown elapsed.
    CountdownTick,
    /// Stopwatch progress in hundredths of a second.
    StopwatchTick(u64),
    Geo(GeoSample),
    Motion(MotionSample),
    Stop,
}
