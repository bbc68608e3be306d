//! Audio and haptic cues fired on countdown transitions.
//!
//! Cues are fire-and-forget. A missing asset or a playback error is logged
//! and the countdown carries on, vibration-only or silent.

use serde::{Deserialize, Serialize};

use super::sequencer::CueKind;
use crate::error::CueError;
use crate::storage::FeedbackSettings;

/// Loads audio assets by id.
pub trait AudioBackend: Send {
    fn load(&mut self, asset: &str) -> Result<Box<dyn AudioCue>, CueError>;
}

/// A loaded, playable sound.
pub trait AudioCue: Send {
    fn play(&self) -> Result<(), CueError>;
}

/// Device vibration. Never reports failure.
pub trait HapticFeedback: Send {
    fn vibrate(&self);
}

/// Backend for headless hosts: every asset loads and plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

struct SilentCue;

impl AudioCue for SilentCue {
    fn play(&self) -> Result<(), CueError> {
        Ok(())
    }
}

impl AudioBackend for SilentAudio {
    fn load(&mut self, _asset: &str) -> Result<Box<dyn AudioCue>, CueError> {
        Ok(Box::new(SilentCue))
    }
}

/// Haptics for hosts without a vibration motor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHaptics;

impl HapticFeedback for NoHaptics {
    fn vibrate(&self) {}
}

/// What actually happened when a cue fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CueOutcome {
    pub audible: bool,
    pub haptic: bool,
}

/// Fires the mark-to-set and go cues according to the feedback settings.
pub struct CuePlayer {
    mark_to_set: Option<Box<dyn AudioCue>>,
    go: Option<Box<dyn AudioCue>>,
    haptics: Box<dyn HapticFeedback>,
    vibration_enabled: bool,
}

impl CuePlayer {
    /// Load both sounds up front. With audio disabled nothing is loaded.
    pub fn load(
        audio: &mut dyn AudioBackend,
        haptics: Box<dyn HapticFeedback>,
        settings: &FeedbackSettings,
    ) -> Self {
        let (mark_to_set, go) = if settings.audio_enabled {
            (
                load_or_warn(audio, &settings.mark_to_set_asset),
                load_or_warn(audio, &settings.go_asset),
            )
        } else {
            (None, None)
        };
        Self {
            mark_to_set,
            go,
            haptics,
            vibration_enabled: settings.vibration_enabled,
        }
    }

    pub fn emit(&self, cue: CueKind) -> CueOutcome {
        let mut outcome = CueOutcome::default();
        if self.vibration_enabled {
            self.haptics.vibrate();
            outcome.haptic = true;
        }
        let sound = match cue {
            CueKind::MarkToSet => self.mark_to_set.as_deref(),
            CueKind::Go => self.go.as_deref(),
        };
        if let Some(sound) = sound {
            match sound.play() {
                Ok(()) => outcome.audible = true,
                Err(e) => tracing::warn!(?cue, error = %e, "audio cue failed to play"),
            }
        }
        outcome
    }
}

fn load_or_warn(audio: &mut dyn AudioBackend, asset: &str) -> Option<Box<dyn AudioCue>> {
    match audio.load(asset) {
        Ok(cue) => Some(cue),
        Err(e) => {
            tracing::warn!(asset, error = %e, "audio asset unavailable, cue will be silent");
            None
        }
    }
}
