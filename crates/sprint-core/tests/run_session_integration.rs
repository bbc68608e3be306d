//! Integration tests for the run session.
//!
//! Drives full runs through scripted sensors, a manual clock and an
//! in-memory history store, from countdown to stored record.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sprint_core::countdown::{AudioBackend, AudioCue, HapticFeedback, SilentAudio};
use sprint_core::sensors::{Acceleration, LocationFix, ScriptedLocationStream, ScriptedMotionStream, SensorKind};
use sprint_core::session::{drive, Clock, ManualClock, SystemClock};
use sprint_core::{
    Collaborators, CoreError, CueError, Event, FinishReason, MemoryRecordStore, Phase, RunSession, RunSettings,
    SensorError, SessionInput, SessionState,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Meters per degree of latitude on the haversine sphere.
fn degrees_for(meters: f64) -> f64 {
    (meters / 6_371_000.0).to_degrees()
}

#[derive(Clone, Default)]
struct CountingHaptics(Arc<AtomicUsize>);

impl HapticFeedback for CountingHaptics {
    fn vibrate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct MissingAssets;

impl AudioBackend for MissingAssets {
    fn load(&mut self, asset: &str) -> Result<Box<dyn AudioCue>, CueError> {
        Err(CueError::AssetLoad {
            asset: asset.to_string(),
            message: "not bundled".into(),
        })
    }
}

struct Harness {
    session: RunSession,
    inbox: UnboundedReceiver<SessionInput>,
    location: ScriptedLocationStream,
    motion: ScriptedMotionStream,
    store: MemoryRecordStore,
    clock: ManualClock,
    haptics: CountingHaptics,
}

struct Options {
    location: ScriptedLocationStream,
    motion: ScriptedMotionStream,
    store: MemoryRecordStore,
    audio: Box<dyn AudioBackend>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            location: ScriptedLocationStream::new(),
            motion: ScriptedMotionStream::new(),
            store: MemoryRecordStore::new(),
            audio: Box::new(SilentAudio),
        }
    }
}

fn settings() -> RunSettings {
    let mut settings = RunSettings::default();
    settings.countdown.on_your_mark_interval_sec = 3;
    settings.countdown.get_set_interval_sec = 1;
    settings.countdown.randomize_get_set = false;
    settings
}

fn harness(settings: RunSettings, options: Options) -> Harness {
    let (tx, rx) = unbounded_channel();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap());
    let haptics = CountingHaptics::default();
    let session = RunSession::new(
        settings,
        Collaborators {
            location: Box::new(options.location.clone()),
            motion: Box::new(options.motion.clone()),
            audio: options.audio,
            haptics: Box::new(haptics.clone()),
            store: Box::new(options.store.clone()),
            clock: Arc::new(clock.clone()),
        },
        tx,
    );
    Harness {
        session,
        inbox: rx,
        location: options.location,
        motion: options.motion,
        store: options.store,
        clock,
        haptics,
    }
}

impl Harness {
    fn tick(&mut self) -> Result<Vec<Event>, CoreError> {
        self.clock.advance(chrono::Duration::seconds(1));
        self.session.handle(SessionInput::CountdownTick)
    }

    /// Run the countdown to Go.
    fn go(&mut self) -> Vec<Event> {
        self.session.start();
        let mut events = Vec::new();
        while self.session.state() == SessionState::Countdown {
            events.extend(self.tick().unwrap());
        }
        events
    }

    fn pump(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(input) = self.inbox.try_recv() {
            events.extend(self.session.handle(input).unwrap());
        }
        events
    }

    fn geo(&mut self, meters_north: f64, speed: Option<f64>) -> Vec<Event> {
        self.location.push(LocationFix {
            timestamp: self.clock.now(),
            latitude: degrees_for(meters_north),
            longitude: 0.0,
            speed,
        });
        self.pump()
    }

    fn stride(&mut self) {
        self.motion.push(Acceleration { x: 1.0, y: 1.0, z: 1.0 });
        self.pump();
    }
}

#[test]
fn test_countdown_phases_and_cues() {
    let mut h = harness(settings(), Options::default());
    h.session.start();

    for _ in 0..2 {
        let events = h.tick().unwrap();
        assert!(matches!(events[0], Event::CountdownTick { phase: Phase::OnYourMarks, .. }));
    }
    let events = h.tick().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PhaseChanged {
            from: Phase::OnYourMarks,
            to: Phase::GetSet,
            ..
        }
    )));
    assert_eq!(h.session.phase(), Some(Phase::GetSet));
    assert_eq!(h.haptics.0.load(Ordering::SeqCst), 1);
    assert!(!h.location.is_subscribed());

    let events = h.tick().unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::PhaseChanged { to: Phase::Go, .. })));
    assert!(matches!(events.last(), Some(Event::TrackingStarted { .. })));
    assert_eq!(h.session.state(), SessionState::Tracking);
    assert_eq!(h.haptics.0.load(Ordering::SeqCst), 2);
    assert!(h.location.is_subscribed());
    assert!(h.motion.is_subscribed());
}

#[test]
fn test_full_run_produces_record() {
    let mut h = harness(settings(), Options::default());
    h.go();

    h.geo(0.0, Some(2.0));
    h.geo(10.0, Some(3.5));
    for _ in 0..5 {
        h.stride();
    }
    h.session.handle(SessionInput::StopwatchTick(500)).unwrap();
    h.clock.advance(chrono::Duration::seconds(5));

    let events = h.session.stop();
    let record = events[0].finished_record().unwrap().clone();
    assert!((record.distance_meters() - 10.0).abs() < 1e-6);
    assert_eq!(record.steps(), 5);
    assert_eq!(record.time_elapsed(), "00:05:00");
    assert_eq!(record.max_speed_mps(), 3.5);
    assert!((record.calories_kcal() - 0.0136).abs() < 1e-9);
    assert_eq!(record.calories_kcal(), record.distance_meters() * 0.00136);
    assert_eq!(record.date(), chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(record.finish_time() - record.start_time(), chrono::Duration::seconds(5));

    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.session.metrics().distance_meters, 0.0);
    assert_eq!(h.store.records(), vec![record]);
}

#[test]
fn test_distance_goal_finishes_run() {
    let mut s = settings();
    s.tracking.distance_goal_meters = Some(100.0);
    let mut h = harness(s, Options::default());
    h.go();

    assert!(h.geo(0.0, None).is_empty());
    assert!(h.geo(60.0, None).is_empty());
    let events = h.geo(120.0, None);

    assert!(matches!(events[0], Event::DistanceGoalReached { goal_meters, .. } if goal_meters == 100.0));
    assert!(matches!(
        events[1],
        Event::RunFinished {
            reason: FinishReason::GoalReached,
            saved: true,
            ..
        }
    ));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(!h.location.is_subscribed());
    assert_eq!(h.store.len(), 1);

    // Readings still in flight after the goal are dropped.
    assert!(!h.location.push(LocationFix {
        timestamp: Utc::now(),
        latitude: 1.0,
        longitude: 1.0,
        speed: None,
    }));
    assert!(h.pump().is_empty());
}

#[test]
fn test_stop_twice_saves_once() {
    let mut h = harness(settings(), Options::default());
    h.go();
    assert_eq!(h.session.stop().len(), 1);
    assert!(h.session.stop().is_empty());
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.location.stop_count(), 1);
    assert_eq!(h.motion.stop_count(), 1);
    assert!(!h.session.is_sampling());
}

#[test]
fn test_stop_during_countdown_cancels() {
    let mut h = harness(settings(), Options::default());
    h.session.start();
    h.tick().unwrap();
    let events = h.session.stop();
    assert!(matches!(events[0], Event::CountdownCancelled { phase: Phase::OnYourMarks, .. }));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.store.is_empty());
    assert_eq!(h.location.start_count(), 0);

    // A stray tick after cancelling does nothing.
    assert!(h.tick().unwrap().is_empty());
}

#[test]
fn test_permission_denied_aborts_without_leaks() {
    let options = Options {
        motion: ScriptedMotionStream::refusing(SensorError::PermissionDenied {
            sensor: SensorKind::Motion,
        }),
        ..Options::default()
    };
    let mut h = harness(settings(), options);
    h.session.start();
    for _ in 0..3 {
        h.tick().unwrap();
    }
    let err = h.tick().unwrap_err();
    assert!(matches!(
        err,
        CoreError::Sensor(SensorError::PermissionDenied {
            sensor: SensorKind::Motion
        })
    ));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.location.start_count(), 1);
    assert!(!h.location.is_subscribed());
    assert!(!h.session.is_sampling());
    assert!(h.store.is_empty());
}

#[test]
fn test_unavailable_motion_degrades() {
    let options = Options {
        motion: ScriptedMotionStream::refusing(SensorError::Unavailable {
            sensor: SensorKind::Motion,
        }),
        ..Options::default()
    };
    let mut h = harness(settings(), options);
    let events = h.go();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SensorDegraded {
            sensor: SensorKind::Motion,
            ..
        }
    )));
    assert_eq!(h.session.state(), SessionState::Tracking);

    h.geo(0.0, None);
    h.geo(25.0, None);
    let record = h.session.stop()[0].finished_record().unwrap().clone();
    assert_eq!(record.steps(), 0);
    assert!((record.distance_meters() - 25.0).abs() < 1e-6);
}

#[test]
fn test_missing_audio_asset_still_vibrates() {
    let options = Options {
        audio: Box::new(MissingAssets),
        ..Options::default()
    };
    let mut h = harness(settings(), options);
    let events = h.go();
    let cues: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::CueFired { audible, haptic, .. } => Some((*audible, *haptic)),
            _ => None,
        })
        .collect();
    assert_eq!(cues, vec![(false, true), (false, true)]);
    assert_eq!(h.session.state(), SessionState::Tracking);
}

#[test]
fn test_rejected_persistence_still_finishes() {
    let options = Options {
        store: MemoryRecordStore::rejecting(),
        ..Options::default()
    };
    let mut h = harness(settings(), options);
    h.go();
    let events = h.session.stop();
    assert!(matches!(events[0], Event::RunFinished { saved: false, .. }));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.store.is_empty());
}

#[test]
fn test_samples_outside_tracking_are_ignored() {
    let mut h = harness(settings(), Options::default());
    h.session.start();
    let early = sprint_core::sensors::GeoSample::new(Utc::now(), 0.0, 0.0, Some(9.0));
    h.session.handle(SessionInput::Geo(early)).unwrap();
    h.go();
    assert_eq!(h.session.metrics().max_speed_mps, 0.0);
}

#[test]
fn test_sessions_are_reusable() {
    let mut h = harness(settings(), Options::default());
    h.go();
    h.geo(0.0, None);
    h.geo(40.0, None);
    h.session.stop();

    h.go();
    h.geo(0.0, None);
    h.geo(15.0, None);
    h.session.stop();

    let records = h.store.records();
    assert_eq!(records.len(), 2);
    assert!((records[1].distance_meters() - 15.0).abs() < 1e-6);
    assert_eq!(h.location.start_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_driver_runs_timers() {
    let (tx, mut rx) = unbounded_channel();
    let store = MemoryRecordStore::new();
    let location = ScriptedLocationStream::new();
    let mut session = RunSession::new(
        settings(),
        Collaborators {
            location: Box::new(location.clone()),
            motion: Box::new(ScriptedMotionStream::new()),
            audio: Box::new(SilentAudio),
            haptics: Box::new(CountingHaptics::default()),
            store: Box::new(store.clone()),
            clock: Arc::new(SystemClock),
        },
        tx.clone(),
    );

    // Countdown takes four seconds; stop five seconds into the run.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(9_005)).await;
        tx.send(SessionInput::Stop).unwrap();
    });

    let mut phases = Vec::new();
    let record = drive(&mut session, &mut rx, |event| {
        if let Event::PhaseChanged { to, .. } = event {
            phases.push(*to);
        }
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(phases, vec![Phase::GetSet, Phase::Go]);
    let elapsed = record.elapsed_hundredths().unwrap();
    assert!((495..=505).contains(&elapsed), "elapsed {elapsed}");
    assert_eq!(store.len(), 1);
    assert!(!location.is_subscribed());
}
