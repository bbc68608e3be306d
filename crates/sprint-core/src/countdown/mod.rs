mod cues;
mod sequencer;

pub use cues::{AudioBackend, AudioCue, CueOutcome, CuePlayer, HapticFeedback, NoHaptics, SilentAudio};
pub use sequencer::{CueKind, CueSequencer, Phase, SequencerStep, RANDOM_GET_SET_RANGE};
