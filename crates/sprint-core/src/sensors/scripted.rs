//! In-process sensor streams driven by the caller.
//!
//! Used to replay recorded sensor traces and to exercise sessions in tests.
//! Clones share state, so a caller can keep a handle after boxing one into a
//! session and push readings or inspect the subscription lifecycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Acceleration, LocationFix, LocationOptions, LocationSink, LocationStream, MotionSink, MotionStream, SensorSubscription};
use crate::error::SensorError;

struct Script<S> {
    sink: Option<S>,
    starts: usize,
    stops: usize,
    refusal: Option<SensorError>,
}

impl<S> Default for Script<S> {
    fn default() -> Self {
        Self {
            sink: None,
            starts: 0,
            stops: 0,
            refusal: None,
        }
    }
}

type Shared<S> = Arc<Mutex<Script<S>>>;

fn lock<S>(shared: &Shared<S>) -> MutexGuard<'_, Script<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScriptedSubscription<S> {
    shared: Shared<S>,
}

impl<S: Send + 'static> SensorSubscription for ScriptedSubscription<S> {
    fn stop(&mut self) {
        let mut script = lock(&self.shared);
        if script.sink.take().is_some() {
            script.stops += 1;
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedLocationStream {
    shared: Shared<LocationSink>,
    options: Arc<Mutex<Option<LocationOptions>>>,
}

impl ScriptedLocationStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream whose every `start` fails with `err`.
    pub fn refusing(err: SensorError) -> Self {
        let stream = Self::new();
        lock(&stream.shared).refusal = Some(err);
        stream
    }

    /// Deliver a fix to the current subscriber, if any.
    pub fn push(&self, fix: LocationFix) -> bool {
        let sink = lock(&self.shared).sink.clone();
        sink.is_some_and(|sink| sink.push(fix))
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.shared).sink.is_some()
    }

    pub fn start_count(&self) -> usize {
        lock(&self.shared).starts
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.shared).stops
    }

    pub fn last_options(&self) -> Option<LocationOptions> {
        self.options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocationStream for ScriptedLocationStream {
    fn start(
        &mut self,
        options: &LocationOptions,
        sink: LocationSink,
    ) -> Result<Box<dyn SensorSubscription>, SensorError> {
        let mut script = lock(&self.shared);
        if let Some(err) = script.refusal.clone() {
            return Err(err);
        }
        script.starts += 1;
        script.sink = Some(sink);
        *self.options.lock().unwrap_or_else(PoisonError::into_inner) = Some(options.clone());
        Ok(Box::new(ScriptedSubscription {
            shared: self.shared.clone(),
        }))
    }
}

#[derive(Clone, Default)]
pub struct ScriptedMotionStream {
    shared: Shared<MotionSink>,
    interval_ms: Arc<Mutex<Option<u64>>>,
}

impl ScriptedMotionStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(err: SensorError) -> Self {
        let stream = Self::new();
        lock(&stream.shared).refusal = Some(err);
        stream
    }

    pub fn push(&self, reading: Acceleration) -> bool {
        let sink = lock(&self.shared).sink.clone();
        sink.is_some_and(|sink| sink.push(reading))
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.shared).sink.is_some()
    }

    pub fn start_count(&self) -> usize {
        lock(&self.shared).starts
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.shared).stops
    }

    pub fn last_interval_ms(&self) -> Option<u64> {
        *self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MotionStream for ScriptedMotionStream {
    fn start(
        &mut self,
        update_interval_ms: u64,
        sink: MotionSink,
    ) -> Result<Box<dyn SensorSubscription>, SensorError> {
        let mut script = lock(&self.shared);
        if let Some(err) = script.refusal.clone() {
            return Err(err);
        }
        script.starts += 1;
        script.sink = Some(sink);
        *self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner) = Some(update_interval_ms);
        Ok(Box::new(ScriptedSubscription {
            shared: self.shared.clone(),
        }))
    }
}
