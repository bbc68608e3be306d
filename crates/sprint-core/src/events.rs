use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::{CueKind, Phase};
use crate::metrics::MetricsSnapshot;
use crate::sensors::SensorKind;
use crate::session::{RunRecord, SessionState};

/// Why a tracked run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Manual,
    GoalReached,
}

/// Every state change in a run session produces an Event.
/// Hosts render them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CountdownStarted {
        mark_interval_secs: u32,
        get_set_interval_secs: u32,
        at: DateTime<Utc>,
    },
    CountdownTick {
        phase: Phase,
        seconds_remaining: u32,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        at: DateTime<Utc>,
    },
    /// A cue fired; `audible`/`haptic` report what actually played.
    CueFired {
        cue: CueKind,
        audible: bool,
        haptic: bool,
        at: DateTime<Utc>,
    },
    /// Stop requested before Go. No record is produced.
    CountdownCancelled {
        phase: Phase,
        at: DateTime<Utc>,
    },
    TrackingStarted {
        started_at: DateTime<Utc>,
    },
    /// A sensor could not start; the run continues without its metric.
    SensorDegraded {
        sensor: SensorKind,
        reason: String,
        at: DateTime<Utc>,
    },
    DistanceGoalReached {
        goal_meters: f64,
        distance_meters: f64,
        at: DateTime<Utc>,
    },
    /// The run ended. `saved` is false when the history store rejected the
    /// record; the run still counts as finished.
    RunFinished {
        reason: FinishReason,
        record: RunRecord,
        saved: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: SessionState,
        phase: Option<Phase>,
        seconds_remaining: Option<u32>,
        metrics: MetricsSnapshot,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The finished record, if this event ends a run.
    pub fn finished_record(&self) -> Option<&RunRecord> {
        match self {
            Event::RunFinished { record, .. } => Some(record),
            _ => None,
        }
    }
}
