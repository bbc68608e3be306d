use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::{LocationOptions, LocationSink, LocationStream, MotionSink, MotionStream, SensorSubscription};
use crate::error::SensorError;
use crate::session::{Clock, SessionInput};

/// A live subscription plus the gate its sink checks before forwarding.
struct ActiveSubscription {
    handle: Box<dyn SensorSubscription>,
    open: Arc<AtomicBool>,
}

impl ActiveSubscription {
    fn close(mut self) {
        self.open.store(false, Ordering::Release);
        self.handle.stop();
    }
}

/// Owns the location stream for one session and its subscription lifecycle.
pub struct GeoSampler {
    stream: Box<dyn LocationStream>,
    options: LocationOptions,
    active: Option<ActiveSubscription>,
}

impl GeoSampler {
    pub fn new(stream: Box<dyn LocationStream>, options: LocationOptions) -> Self {
        Self {
            stream,
            options,
            active: None,
        }
    }

    /// Subscribe, forwarding samples into `inbox`. Starting an already active
    /// sampler is a no-op.
    pub fn start(&mut self, inbox: &UnboundedSender<SessionInput>) -> Result<(), SensorError> {
        if self.active.is_some() {
            return Ok(());
        }
        let open = Arc::new(AtomicBool::new(true));
        let sink = LocationSink::new(inbox.clone(), open.clone());
        let handle = self.stream.start(&self.options, sink)?;
        tracing::debug!(accuracy = ?self.options.accuracy, "location sampler started");
        self.active = Some(ActiveSubscription { handle, open });
        Ok(())
    }

    /// Unsubscribe. Returns `false` if nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.close();
                tracing::debug!("location sampler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for GeoSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the accelerometer stream for one session.
pub struct MotionSampler {
    stream: Box<dyn MotionStream>,
    update_interval_ms: u64,
    clock: Arc<dyn Clock>,
    active: Option<ActiveSubscription>,
}

impl MotionSampler {
    pub fn new(stream: Box<dyn MotionStream>, update_interval_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            stream,
            update_interval_ms,
            clock,
            active: None,
        }
    }

    pub fn start(&mut self, inbox: &UnboundedSender<SessionInput>) -> Result<(), SensorError> {
        if self.active.is_some() {
            return Ok(());
        }
        let open = Arc::new(AtomicBool::new(true));
        let sink = MotionSink::new(inbox.clone(), open.clone(), self.clock.clone());
        let handle = self.stream.start(self.update_interval_ms, sink)?;
        tracing::debug!(interval_ms = self.update_interval_ms, "motion sampler started");
        self.active = Some(ActiveSubscription { handle, open });
        Ok(())
    }

    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.close();
                tracing::debug!("motion sampler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for MotionSampler {
    fn drop(&mut self) {
        self.stop();
    }
}
