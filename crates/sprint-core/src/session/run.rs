use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use tokio::sync::mpsc::UnboundedSender;

use super::{Clock, RunRecord, SessionInput, SessionState};
use crate::countdown::{AudioBackend, CuePlayer, CueSequencer, HapticFeedback, Phase, SequencerStep};
use crate::error::{Result, SensorError};
use crate::events::{Event, FinishReason};
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::sensors::{GeoSample, GeoSampler, LocationStream, MotionSample, MotionSampler, MotionStream};
use crate::storage::{RunRecordStore, RunSettings};

/// Platform services a session runs against.
pub struct Collaborators {
    pub location: Box<dyn LocationStream>,
    pub motion: Box<dyn MotionStream>,
    pub audio: Box<dyn AudioBackend>,
    pub haptics: Box<dyn HapticFeedback>,
    pub store: Box<dyn RunRecordStore>,
    pub clock: Arc<dyn Clock>,
}

/// One run, from countdown to stored record.
///
/// The session never schedules anything itself. Its host delivers
/// [`SessionInput`]s (see [`drive`](super::drive)) and renders the
/// returned events.
pub struct RunSession {
    settings: RunSettings,
    state: SessionState,
    sequencer: Option<CueSequencer>,
    cues: CuePlayer,
    geo: GeoSampler,
    motion: MotionSampler,
    metrics: RunMetrics,
    started_at: Option<DateTime<Utc>>,
    store: Box<dyn RunRecordStore>,
    clock: Arc<dyn Clock>,
    rng: Mcg128Xsl64,
    inbox: UnboundedSender<SessionInput>,
}

impl RunSession {
    /// Sensor samples are forwarded into `inbox`; the host must feed what
    /// arrives there back through [`handle`](Self::handle).
    pub fn new(settings: RunSettings, parts: Collaborators, inbox: UnboundedSender<SessionInput>) -> Self {
        let Collaborators {
            location,
            motion,
            mut audio,
            haptics,
            store,
            clock,
        } = parts;
        let cues = CuePlayer::load(audio.as_mut(), haptics, &settings.feedback);
        let rng = match settings.tracking.random_seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Self {
            geo: GeoSampler::new(location, settings.sensors.location_options()),
            motion: MotionSampler::new(motion, settings.sensors.motion_update_interval_ms, clock.clone()),
            metrics: RunMetrics::new(
                settings.tracking.calorie_factor_per_meter,
                settings.tracking.step_threshold,
            ),
            state: SessionState::Idle,
            sequencer: None,
            started_at: None,
            cues,
            store,
            clock,
            rng,
            inbox,
            settings,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Current countdown phase, `None` outside the countdown.
    pub fn phase(&self) -> Option<Phase> {
        self.sequencer.as_ref().map(CueSequencer::phase)
    }

    pub fn seconds_remaining(&self) -> Option<u32> {
        self.sequencer.as_ref().map(CueSequencer::seconds_remaining)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether any sensor subscription is live.
    pub fn is_sampling(&self) -> bool {
        self.geo.is_active() || self.motion.is_active()
    }

    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            phase: self.phase(),
            seconds_remaining: self.seconds_remaining(),
            metrics: self.metrics(),
            at: self.clock.now(),
        }
    }

    /// Begin the countdown. Ignored unless idle.
    pub fn start(&mut self) -> Vec<Event> {
        if self.state != SessionState::Idle {
            tracing::debug!(state = ?self.state, "start ignored, session busy");
            return Vec::new();
        }
        let sequencer = CueSequencer::from_settings(&self.settings.countdown, &mut self.rng);
        let event = Event::CountdownStarted {
            mark_interval_secs: sequencer.mark_interval(),
            get_set_interval_secs: sequencer.get_set_interval(),
            at: self.clock.now(),
        };
        tracing::info!(
            mark = sequencer.mark_interval(),
            get_set = sequencer.get_set_interval(),
            "countdown started"
        );
        self.metrics.reset();
        self.sequencer = Some(sequencer);
        self.state = SessionState::Countdown;
        vec![event]
    }

    /// Apply one input. An `Err` means the run was aborted and the session
    /// is back to `Idle` with every sensor released.
    pub fn handle(&mut self, input: SessionInput) -> Result<Vec<Event>> {
        match input {
            SessionInput::CountdownTick => self.countdown_tick(),
            SessionInput::StopwatchTick(hundredths) => {
                self.stopwatch_tick(hundredths);
                Ok(Vec::new())
            }
            SessionInput::Geo(sample) => Ok(self.on_geo(sample)),
            SessionInput::Motion(sample) => {
                self.on_motion(&sample);
                Ok(Vec::new())
            }
            SessionInput::Stop => Ok(self.stop()),
        }
    }

    /// Stop whatever is running. Tracking finishes the run, a countdown is
    /// cancelled, and an idle session ignores the request.
    pub fn stop(&mut self) -> Vec<Event> {
        match self.state {
            SessionState::Idle => Vec::new(),
            SessionState::Countdown => {
                let phase = self.phase().unwrap_or(Phase::OnYourMarks);
                tracing::info!(%phase, "countdown cancelled");
                self.release();
                vec![Event::CountdownCancelled {
                    phase,
                    at: self.clock.now(),
                }]
            }
            SessionState::Tracking => self.finish(FinishReason::Manual),
        }
    }

    fn countdown_tick(&mut self) -> Result<Vec<Event>> {
        if self.state != SessionState::Countdown {
            return Ok(Vec::new());
        }
        let Some(sequencer) = self.sequencer.as_mut() else {
            return Ok(Vec::new());
        };
        let at = self.clock.now();
        let mut events = Vec::new();
        match sequencer.tick() {
            SequencerStep::Counting {
                phase,
                seconds_remaining,
            } => events.push(Event::CountdownTick {
                phase,
                seconds_remaining,
                at,
            }),
            SequencerStep::Advanced { from, to, cue } => {
                let outcome = self.cues.emit(cue);
                tracing::info!(%from, %to, "countdown phase changed");
                events.push(Event::PhaseChanged { from, to, at });
                events.push(Event::CueFired {
                    cue,
                    audible: outcome.audible,
                    haptic: outcome.haptic,
                    at,
                });
                if to == Phase::Go {
                    self.begin_tracking(&mut events)?;
                }
            }
            SequencerStep::Inert => {}
        }
        Ok(events)
    }

    fn begin_tracking(&mut self, events: &mut Vec<Event>) -> Result<(), SensorError> {
        let started_at = self.clock.now();
        self.sequencer = None;
        self.metrics.reset();
        self.started_at = Some(started_at);
        self.state = SessionState::Tracking;

        if let Err(err) = self.geo.start(&self.inbox) {
            self.sensor_failed(err, events)?;
        }
        if let Err(err) = self.motion.start(&self.inbox) {
            self.sensor_failed(err, events)?;
        }
        tracing::info!(%started_at, "tracking started");
        events.push(Event::TrackingStarted { started_at });
        Ok(())
    }

    fn sensor_failed(&mut self, err: SensorError, events: &mut Vec<Event>) -> Result<(), SensorError> {
        if err.is_fatal() {
            tracing::warn!(error = %err, "aborting run");
            self.release();
            return Err(err);
        }
        tracing::warn!(error = %err, "continuing without sensor");
        events.push(Event::SensorDegraded {
            sensor: err.sensor(),
            reason: err.to_string(),
            at: self.clock.now(),
        });
        Ok(())
    }

    fn stopwatch_tick(&mut self, hundredths: u64) {
        if self.state == SessionState::Tracking {
            self.metrics.add_elapsed(hundredths);
        }
    }

    fn on_geo(&mut self, sample: GeoSample) -> Vec<Event> {
        if self.state != SessionState::Tracking {
            tracing::trace!("dropping location sample outside tracking");
            return Vec::new();
        }
        self.metrics.record_geo(sample);
        let distance = self.metrics.distance_m();
        match self.settings.tracking.distance_goal_meters {
            Some(goal) if distance >= goal => {
                tracing::info!(goal, distance, "distance goal reached");
                let mut events = vec![Event::DistanceGoalReached {
                    goal_meters: goal,
                    distance_meters: distance,
                    at: self.clock.now(),
                }];
                events.extend(self.finish(FinishReason::GoalReached));
                events
            }
            _ => Vec::new(),
        }
    }

    fn on_motion(&mut self, sample: &MotionSample) {
        if self.state != SessionState::Tracking {
            tracing::trace!("dropping motion sample outside tracking");
            return;
        }
        self.metrics.record_motion(sample);
    }

    fn finish(&mut self, reason: FinishReason) -> Vec<Event> {
        let finished_at = self.clock.now();
        let started_at = self.started_at.unwrap_or(finished_at);
        self.geo.stop();
        self.motion.stop();

        let record = RunRecord::finalize(
            started_at,
            finished_at,
            &self.metrics.snapshot(),
            self.settings.history.utc_offset_minutes,
        );
        let saved = match self.store.append(&record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "run finished but could not be saved");
                false
            }
        };
        tracing::info!(
            ?reason,
            elapsed = record.time_elapsed(),
            distance = record.distance_meters(),
            steps = record.steps(),
            saved,
            "run finished"
        );
        self.release();
        vec![Event::RunFinished {
            reason,
            record,
            saved,
            at: finished_at,
        }]
    }

    /// Back to idle: sensors released, countdown dropped, metrics zeroed.
    fn release(&mut self) {
        self.geo.stop();
        self.motion.stop();
        self.sequencer = None;
        self.metrics.reset();
        self.started_at = None;
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::{NoHaptics, SilentAudio};
    use crate::sensors::{ScriptedLocationStream, ScriptedMotionStream};
    use crate::session::ManualClock;
    use crate::storage::MemoryRecordStore;
    use chrono::TimeZone;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Rig {
        session: RunSession,
        store: MemoryRecordStore,
        location: ScriptedLocationStream,
        _inbox: UnboundedReceiver<SessionInput>,
    }

    fn rig(settings: RunSettings) -> Rig {
        let (tx, rx) = unbounded_channel();
        let store = MemoryRecordStore::new();
        let location = ScriptedLocationStream::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap());
        let session = RunSession::new(
            settings,
            Collaborators {
                location: Box::new(location.clone()),
                motion: Box::new(ScriptedMotionStream::new()),
                audio: Box::new(SilentAudio),
                haptics: Box::new(NoHaptics),
                store: Box::new(store.clone()),
                clock: Arc::new(clock),
            },
            tx,
        );
        Rig {
            session,
            store,
            location,
            _inbox: rx,
        }
    }

    fn quick_settings() -> RunSettings {
        let mut settings = RunSettings::default();
        settings.countdown.on_your_mark_interval_sec = 1;
        settings.countdown.get_set_interval_sec = 1;
        settings.countdown.randomize_get_set = false;
        settings
    }

    #[test]
    fn start_only_from_idle() {
        let mut rig = rig(quick_settings());
        assert_eq!(rig.session.start().len(), 1);
        assert_eq!(rig.session.state(), SessionState::Countdown);
        assert!(rig.session.start().is_empty());
    }

    #[test]
    fn two_ticks_reach_tracking() {
        let mut rig = rig(quick_settings());
        rig.session.start();
        rig.session.handle(SessionInput::CountdownTick).unwrap();
        assert_eq!(rig.session.phase(), Some(Phase::GetSet));
        let events = rig.session.handle(SessionInput::CountdownTick).unwrap();
        assert_eq!(rig.session.state(), SessionState::Tracking);
        assert!(matches!(events.last(), Some(Event::TrackingStarted { .. })));
        assert!(rig.location.is_subscribed());
    }

    #[test]
    fn stopwatch_ignored_outside_tracking() {
        let mut rig = rig(quick_settings());
        rig.session.handle(SessionInput::StopwatchTick(100)).unwrap();
        rig.session.start();
        rig.session.handle(SessionInput::StopwatchTick(100)).unwrap();
        assert_eq!(rig.session.metrics().elapsed_hundredths, 0);
    }

    #[test]
    fn stop_while_idle_does_nothing() {
        let mut rig = rig(quick_settings());
        assert!(rig.session.stop().is_empty());
        assert!(rig.store.is_empty());
    }

    #[test]
    fn snapshot_reports_countdown_position() {
        let mut settings = quick_settings();
        settings.countdown.on_your_mark_interval_sec = 4;
        let mut rig = rig(settings);
        rig.session.start();
        rig.session.handle(SessionInput::CountdownTick).unwrap();
        match rig.session.snapshot() {
            Event::StateSnapshot {
                state,
                phase,
                seconds_remaining,
                ..
            } => {
                assert_eq!(state, SessionState::Countdown);
                assert_eq!(phase, Some(Phase::OnYourMarks));
                assert_eq!(seconds_remaining, Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
