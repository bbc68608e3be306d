//! Replay of recorded sensor traces through a real session.
//!
//! A trace is a JSON document of timestamped location and motion readings,
//! offsets counted in hundredths of a second from the Go signal:
//!
//! ```json
//! {
//!   "startedAt": "2024-05-01T06:30:00Z",
//!   "stopAtHundredths": 1200,
//!   "samples": [
//!     { "kind": "geo", "atHundredths": 0, "latitude": 52.0, "longitude": 4.0, "speed": 3.1 },
//!     { "kind": "motion", "atHundredths": 40, "x": 0.9, "y": 0.8, "z": 0.4 }
//!   ]
//! }
//! ```
//!
//! [`replay`] runs the trace on a manual clock and finishes instantly with a
//! reproducible record. [`replay_realtime`] feeds the same readings through
//! [`drive`](super::drive) on the wall clock.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::{drive, Clock, Collaborators, ManualClock, RunRecord, RunSession, SessionInput, SessionState, SystemClock};
use crate::countdown::{NoHaptics, SilentAudio};
use crate::error::Result;
use crate::events::Event;
use crate::sensors::{Acceleration, LocationFix, ScriptedLocationStream, ScriptedMotionStream};
use crate::storage::{RunRecordStore, RunSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorTrace {
    /// Wall time of the countdown start. Defaults to now.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Stop the run at this offset. Defaults to the last sample.
    #[serde(default)]
    pub stop_at_hundredths: Option<u64>,
    pub samples: Vec<TraceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceEntry {
    Geo {
        #[serde(rename = "atHundredths")]
        at_hundredths: u64,
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        speed: Option<f64>,
    },
    Motion {
        #[serde(rename = "atHundredths")]
        at_hundredths: u64,
        x: f64,
        y: f64,
        z: f64,
    },
}

impl TraceEntry {
    pub fn at_hundredths(&self) -> u64 {
        match self {
            TraceEntry::Geo { at_hundredths, .. } | TraceEntry::Motion { at_hundredths, .. } => *at_hundredths,
        }
    }
}

impl SensorTrace {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Samples in playback order. Equal offsets keep their file order.
    pub fn ordered(&self) -> Vec<TraceEntry> {
        let mut samples = self.samples.clone();
        samples.sort_by_key(TraceEntry::at_hundredths);
        samples
    }

    /// Offset at which the run is stopped.
    pub fn end_hundredths(&self) -> u64 {
        self.stop_at_hundredths
            .or_else(|| self.samples.iter().map(TraceEntry::at_hundredths).max())
            .unwrap_or(0)
    }
}

/// Result of a replayed run.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub events: Vec<Event>,
    pub record: Option<RunRecord>,
    pub saved: bool,
}

impl ReplayOutcome {
    fn from_events(events: Vec<Event>) -> Self {
        let (record, saved) = events
            .iter()
            .find_map(|event| match event {
                Event::RunFinished { record, saved, .. } => Some((Some(record.clone()), *saved)),
                _ => None,
            })
            .unwrap_or((None, false));
        Self { events, record, saved }
    }
}

struct Feed {
    location: ScriptedLocationStream,
    motion: ScriptedMotionStream,
}

impl Feed {
    fn new() -> Self {
        Self {
            location: ScriptedLocationStream::new(),
            motion: ScriptedMotionStream::new(),
        }
    }

    /// Returns `false` once the session stopped listening.
    fn push(&self, entry: &TraceEntry, at: DateTime<Utc>) -> bool {
        match *entry {
            TraceEntry::Geo {
                latitude,
                longitude,
                speed,
                ..
            } => self.location.push(LocationFix {
                timestamp: at,
                latitude,
                longitude,
                speed,
            }),
            TraceEntry::Motion { x, y, z, .. } => self.motion.push(Acceleration { x, y, z }),
        }
    }

    fn session(
        &self,
        settings: RunSettings,
        store: Box<dyn RunRecordStore>,
        clock: Arc<dyn Clock>,
        inbox: UnboundedSender<SessionInput>,
    ) -> RunSession {
        RunSession::new(
            settings,
            Collaborators {
                location: Box::new(self.location.clone()),
                motion: Box::new(self.motion.clone()),
                audio: Box::new(SilentAudio),
                haptics: Box::new(NoHaptics),
                store,
                clock,
            },
            inbox,
        )
    }
}

fn drain(
    session: &mut RunSession,
    inbox: &mut UnboundedReceiver<SessionInput>,
    events: &mut Vec<Event>,
) -> Result<()> {
    while let Ok(input) = inbox.try_recv() {
        events.extend(session.handle(input)?);
    }
    Ok(())
}

fn hundredths(count: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(count.saturating_mul(10)).unwrap_or(i64::MAX))
}

/// Replay `trace` on a manual clock. The countdown runs tick by tick, each
/// sample is delivered at its offset, and the run stops at
/// [`SensorTrace::end_hundredths`] unless a distance goal ends it first.
pub fn replay(settings: RunSettings, trace: &SensorTrace, store: Box<dyn RunRecordStore>) -> Result<ReplayOutcome> {
    let clock = ManualClock::new(trace.started_at.unwrap_or_else(Utc::now));
    let (tx, mut rx) = unbounded_channel();
    let feed = Feed::new();
    let mut session = feed.session(settings, store, Arc::new(clock.clone()), tx);

    let mut events = session.start();
    while session.state() == SessionState::Countdown {
        clock.advance(chrono::Duration::seconds(1));
        events.extend(session.handle(SessionInput::CountdownTick)?);
    }
    if session.state() != SessionState::Tracking {
        return Ok(ReplayOutcome::from_events(events));
    }

    let end = trace.end_hundredths();
    let mut cursor = 0;
    for entry in trace.ordered() {
        let at = entry.at_hundredths();
        if at > end {
            break;
        }
        advance(&mut session, &clock, &mut cursor, at, &mut events)?;
        feed.push(&entry, clock.now());
        drain(&mut session, &mut rx, &mut events)?;
        if session.state() != SessionState::Tracking {
            return Ok(ReplayOutcome::from_events(events));
        }
    }

    advance(&mut session, &clock, &mut cursor, end, &mut events)?;
    events.extend(session.stop());
    Ok(ReplayOutcome::from_events(events))
}

fn advance(
    session: &mut RunSession,
    clock: &ManualClock,
    cursor: &mut u64,
    to: u64,
    events: &mut Vec<Event>,
) -> Result<()> {
    if to > *cursor {
        let delta = to - *cursor;
        clock.advance(hundredths(delta));
        events.extend(session.handle(SessionInput::StopwatchTick(delta))?);
        *cursor = to;
    }
    Ok(())
}

/// Replay `trace` on the wall clock through [`drive`]. Samples are fed
/// from a background task once tracking starts, and a stop is sent at the
/// trace end. Returns the finished record.
pub async fn replay_realtime<F>(
    settings: RunSettings,
    trace: &SensorTrace,
    store: Box<dyn RunRecordStore>,
    mut on_event: F,
) -> Result<Option<RunRecord>>
where
    F: FnMut(&Event),
{
    let (tx, mut rx) = unbounded_channel();
    let feed = Arc::new(Feed::new());
    let stopper = tx.clone();
    let mut session = feed.session(settings, store, Arc::new(SystemClock), tx);

    let samples = trace.ordered();
    let end = trace.end_hundredths();
    let mut feeder: Option<JoinHandle<()>> = None;

    let result = drive(&mut session, &mut rx, |event| {
        on_event(event);
        if matches!(event, Event::TrackingStarted { .. }) && feeder.is_none() {
            feeder = Some(tokio::spawn(feed_trace(
                feed.clone(),
                samples.clone(),
                end,
                stopper.clone(),
            )));
        }
    })
    .await;

    if let Some(feeder) = feeder {
        feeder.abort();
    }
    result
}

async fn feed_trace(feed: Arc<Feed>, samples: Vec<TraceEntry>, end: u64, stopper: UnboundedSender<SessionInput>) {
    let origin = tokio::time::Instant::now();
    let offset = |at: u64| Duration::from_millis(at.saturating_mul(10));
    for entry in samples.iter().filter(|entry| entry.at_hundredths() <= end) {
        tokio::time::sleep_until(origin + offset(entry.at_hundredths())).await;
        if !feed.push(entry, Utc::now()) {
            return;
        }
    }
    tokio::time::sleep_until(origin + offset(end)).await;
    if stopper.send(SessionInput::Stop).is_err() {
        tracing::debug!("session gone before trace end");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn parses_tagged_samples() {
        let trace = SensorTrace::from_json(
            r#"{
                "stopAtHundredths": 300,
                "samples": [
                    { "kind": "motion", "atHundredths": 50, "x": 1.0, "y": 1.0, "z": 1.0 },
                    { "kind": "geo", "atHundredths": 10, "latitude": 1.0, "longitude": 2.0 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(trace.started_at, None);
        assert_eq!(trace.end_hundredths(), 300);
        let ordered = trace.ordered();
        assert!(matches!(ordered[0], TraceEntry::Geo { speed: None, .. }));
        assert_eq!(ordered[1].at_hundredths(), 50);
    }

    #[test]
    fn end_defaults_to_last_sample() {
        let trace = SensorTrace {
            started_at: None,
            stop_at_hundredths: None,
            samples: vec![TraceEntry::Motion {
                at_hundredths: 420,
                x: 0.0,
                y: 0.0,
                z: 1.0,
            }],
        };
        assert_eq!(trace.end_hundredths(), 420);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = SensorTrace::from_json(r#"{"samples":[{"kind":"gyro","atHundredths":0}]}"#).unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
    }
}
