//! Async host loop for a [`RunSession`].
//!
//! The driver owns the two periodic timers: a one-second countdown tick and
//! a 10 ms stopwatch tick. Everything else (sensor samples, stop requests)
//! arrives through the session inbox. Only the timer matching the current
//! state is polled, so a finished or cancelled run never sees stale ticks.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval, interval_at, Instant};

use super::{RunRecord, RunSession, SessionInput, SessionState};
use crate::error::Result;
use crate::events::Event;

/// Stopwatch resolution. One tick is one hundredth of a second.
pub const STOPWATCH_TICK_MS: u64 = 10;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Start `session` and run it until the run finishes, is cancelled, or is
/// aborted. Returns the finished record, or `None` for a cancelled
/// countdown. Every event is passed to `on_event` as it happens.
///
/// `inbox` must be the receiving half of the sender given to
/// [`RunSession::new`]. Send [`SessionInput::Stop`] into it to end the run.
pub async fn drive<F>(
    session: &mut RunSession,
    inbox: &mut UnboundedReceiver<SessionInput>,
    mut on_event: F,
) -> Result<Option<RunRecord>>
where
    F: FnMut(&Event),
{
    let mut countdown = interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK);
    let mut stopwatch = interval(Duration::from_millis(STOPWATCH_TICK_MS));
    let mut events = session.start();

    loop {
        let mut tracking_started = false;
        for event in &events {
            on_event(event);
            match event {
                Event::TrackingStarted { .. } => tracking_started = true,
                Event::RunFinished { record, .. } => return Ok(Some(record.clone())),
                _ => {}
            }
        }
        if tracking_started {
            stopwatch.reset();
        }

        let state = session.state();
        if state == SessionState::Idle {
            return Ok(None);
        }

        let input = tokio::select! {
            biased;
            message = inbox.recv() => message.unwrap_or(SessionInput::Stop),
            _ = countdown.tick(), if state == SessionState::Countdown => SessionInput::CountdownTick,
            _ = stopwatch.tick(), if state == SessionState::Tracking => {
                SessionInput::StopwatchTick(STOPWATCH_TICK_MS / 10)
            }
        };
        events = session.handle(input)?;
    }
}
