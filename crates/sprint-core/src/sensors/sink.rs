use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::{Acceleration, GeoSample, LocationFix, MotionSample};
use crate::session::{Clock, SessionInput};

/// Receives fixes from a [`LocationStream`](super::LocationStream).
#[derive(Debug, Clone)]
pub struct LocationSink {
    inbox: UnboundedSender<SessionInput>,
    open: Arc<AtomicBool>,
}

impl LocationSink {
    pub(crate) fn new(inbox: UnboundedSender<SessionInput>, open: Arc<AtomicBool>) -> Self {
        Self { inbox, open }
    }

    /// Forward a fix to the session. Returns `false` if the reading was
    /// dropped because the subscription is closed or the session is gone.
    pub fn push(&self, fix: LocationFix) -> bool {
        if !self.is_open() {
            tracing::debug!("dropping location fix after subscription closed");
            return false;
        }
        self.inbox.send(SessionInput::Geo(GeoSample::from(fix))).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Receives accelerometer readings from a [`MotionStream`](super::MotionStream)
/// and stamps them with the session clock.
#[derive(Clone)]
pub struct MotionSink {
    inbox: UnboundedSender<SessionInput>,
    open: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl MotionSink {
    pub(crate) fn new(
        inbox: UnboundedSender<SessionInput>,
        open: Arc<AtomicBool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { inbox, open, clock }
    }

    pub fn push(&self, reading: Acceleration) -> bool {
        if !self.is_open() {
            tracing::debug!("dropping motion reading after subscription closed");
            return false;
        }
        let sample = MotionSample::new(self.clock.now(), reading);
        self.inbox.send(SessionInput::Motion(sample)).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
