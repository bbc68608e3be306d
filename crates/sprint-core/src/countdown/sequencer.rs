//! Three-phase sprint start countdown.
//!
//! ## Phases
//!
//! ```text
//! OnYourMarks(mark_interval) -> GetSet(get_set_interval) -> Go
//! ```
//!
//! The sequencer has no internal thread. The caller invokes
//! [`CueSequencer::tick`] once per elapsed second.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::storage::CountdownSettings;

/// Bounds for the randomized get-set interval, in seconds.
pub const RANDOM_GET_SET_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    OnYourMarks,
    GetSet,
    Go,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::OnYourMarks => f.write_str("On Your Marks"),
            Phase::GetSet => f.write_str("Get Set"),
            Phase::Go => f.write_str("GO!"),
        }
    }
}

/// Which cue a phase transition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    MarkToSet,
    Go,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStep {
    /// Still counting inside `phase`.
    Counting { phase: Phase, seconds_remaining: u32 },
    /// The countdown for `from` ran out; `cue` should fire now.
    Advanced { from: Phase, to: Phase, cue: CueKind },
    /// Already at `Go`; nothing left to count.
    Inert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueSequencer {
    phase: Phase,
    seconds_remaining: u32,
    mark_interval: u32,
    get_set_interval: u32,
}

impl CueSequencer {
    /// Intervals below one second are treated as one second.
    pub fn new(mark_interval: u32, get_set_interval: u32) -> Self {
        let mark_interval = mark_interval.max(1);
        Self {
            phase: Phase::OnYourMarks,
            seconds_remaining: mark_interval,
            mark_interval,
            get_set_interval: get_set_interval.max(1),
        }
    }

    /// Build a sequencer for one session. With randomization enabled the
    /// get-set interval is drawn here, once, from [`RANDOM_GET_SET_RANGE`].
    pub fn from_settings<R: Rng>(settings: &CountdownSettings, rng: &mut R) -> Self {
        let get_set = if settings.randomize_get_set {
            rng.gen_range(RANDOM_GET_SET_RANGE)
        } else {
            settings.get_set_interval_sec
        };
        Self::new(settings.on_your_mark_interval_sec, get_set)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn mark_interval(&self) -> u32 {
        self.mark_interval
    }

    pub fn get_set_interval(&self) -> u32 {
        self.get_set_interval
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Go
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> SequencerStep {
        if self.phase == Phase::Go {
            return SequencerStep::Inert;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            return SequencerStep::Counting {
                phase: self.phase,
                seconds_remaining: self.seconds_remaining,
            };
        }

        let from = self.phase;
        let (to, cue) = match from {
            Phase::OnYourMarks => {
                self.seconds_remaining = self.get_set_interval;
                (Phase::GetSet, CueKind::MarkToSet)
            }
            Phase::GetSet | Phase::Go => (Phase::Go, CueKind::Go),
        };
        self.phase = to;
        SequencerStep::Advanced { from, to, cue }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    fn settings(mark: u32, get_set: u32, randomize: bool) -> CountdownSettings {
        CountdownSettings {
            on_your_mark_interval_sec: mark,
            get_set_interval_sec: get_set,
            randomize_get_set: randomize,
        }
    }

    #[test]
    fn three_then_one() {
        let mut seq = CueSequencer::new(3, 1);
        assert_eq!(seq.phase(), Phase::OnYourMarks);
        assert_eq!(seq.seconds_remaining(), 3);

        assert_eq!(
            seq.tick(),
            SequencerStep::Counting { phase: Phase::OnYourMarks, seconds_remaining: 2 }
        );
        seq.tick();
        assert_eq!(
            seq.tick(),
            SequencerStep::Advanced { from: Phase::OnYourMarks, to: Phase::GetSet, cue: CueKind::MarkToSet }
        );
        assert_eq!(seq.phase(), Phase::GetSet);
        assert_eq!(seq.seconds_remaining(), 1);

        assert_eq!(
            seq.tick(),
            SequencerStep::Advanced { from: Phase::GetSet, to: Phase::Go, cue: CueKind::Go }
        );
        assert!(seq.is_done());
        assert_eq!(seq.seconds_remaining(), 0);
        assert_eq!(seq.tick(), SequencerStep::Inert);
        assert_eq!(seq.phase(), Phase::Go);
    }

    #[test]
    fn fixed_interval_is_used_without_randomization() {
        let mut rng = Mcg128Xsl64::seed_from_u64(7);
        let seq = CueSequencer::from_settings(&settings(4, 6, false), &mut rng);
        assert_eq!(seq.mark_interval(), 4);
        assert_eq!(seq.get_set_interval(), 6);
    }

    #[test]
    fn randomized_interval_stays_in_range() {
        let mut rng = Mcg128Xsl64::seed_from_u64(42);
        for _ in 0..200 {
            let seq = CueSequencer::from_settings(&settings(3, 2, true), &mut rng);
            assert!(RANDOM_GET_SET_RANGE.contains(&seq.get_set_interval()));
        }
    }

    #[test]
    fn zero_intervals_still_count_one_second() {
        let mut seq = CueSequencer::new(0, 0);
        assert!(matches!(seq.tick(), SequencerStep::Advanced { to: Phase::GetSet, .. }));
        assert!(matches!(seq.tick(), SequencerStep::Advanced { to: Phase::Go, .. }));
    }

    #[test]
    fn phase_display_matches_start_calls() {
        assert_eq!(Phase::OnYourMarks.to_string(), "On Your Marks");
        assert_eq!(Phase::Go.to_string(), "GO!");
    }

    proptest! {
        #[test]
        fn phases_visited_once_in_order(mark in 3u32..=10, get_set in 1u32..=10) {
            let mut seq = CueSequencer::new(mark, get_set);
            let mut visited = vec![seq.phase()];
            let mut ticks = 0u32;
            let mut last_remaining = seq.seconds_remaining();
            while !seq.is_done() {
                match seq.tick() {
                    SequencerStep::Counting { seconds_remaining, .. } => {
                        prop_assert_eq!(seconds_remaining, last_remaining - 1);
                        last_remaining = seconds_remaining;
                    }
                    SequencerStep::Advanced { from, to, .. } => {
                        prop_assert_eq!(Some(&from), visited.last());
                        visited.push(to);
                        last_remaining = seq.seconds_remaining();
                    }
                    SequencerStep::Inert => prop_assert!(false, "inert before Go"),
                }
                ticks += 1;
            }
            prop_assert_eq!(visited, vec![Phase::OnYourMarks, Phase::GetSet, Phase::Go]);
            prop_assert_eq!(ticks, mark + get_set);
        }
    }
}
