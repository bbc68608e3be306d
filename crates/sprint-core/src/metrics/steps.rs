use crate::sensors::MotionSample;

/// Acceleration magnitude (in g) a sample must exceed to count as a step.
pub const DEFAULT_STEP_THRESHOLD: f64 = 1.2;

/// Counts one step per sample whose magnitude exceeds the threshold.
///
/// There is no refractory window, so sustained shaking over-counts.
#[derive(Debug, Clone)]
pub struct StepDetector {
    threshold: f64,
    steps: u64,
}

impl StepDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, steps: 0 }
    }

    /// Returns `true` if the sample registered a step.
    pub fn push(&mut self, sample: &MotionSample) -> bool {
        let is_step = sample.magnitude() > self.threshold;
        if is_step {
            self.steps += 1;
        }
        is_step
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.steps = 0;
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_THRESHOLD)
    }
}
