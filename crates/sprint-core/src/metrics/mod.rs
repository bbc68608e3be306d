//! Live run metrics: distance, steps, speed, calories and elapsed time.

mod distance;
mod steps;

use serde::{Deserialize, Serialize};

use crate::sensors::{GeoSample, MotionSample};

pub use distance::{haversine_distance, DistanceAccumulator, EARTH_RADIUS_M};
pub use steps::{StepDetector, DEFAULT_STEP_THRESHOLD};

/// Kilocalories burned per meter run.
pub const DEFAULT_CALORIE_FACTOR_PER_METER: f64 = 0.00136;

/// Point-in-time view of [`RunMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub elapsed_hundredths: u64,
    pub distance_meters: f64,
    pub steps: u64,
    pub max_speed_mps: f64,
    pub calories_kcal: f64,
}

/// Running totals for one tracked run.
///
/// Calories are always `distance_m() * calorie_factor`, computed on read.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    elapsed_hundredths: u64,
    distance: DistanceAccumulator,
    steps: StepDetector,
    calorie_factor_per_meter: f64,
}

impl RunMetrics {
    pub fn new(calorie_factor_per_meter: f64, step_threshold: f64) -> Self {
        Self {
            elapsed_hundredths: 0,
            distance: DistanceAccumulator::new(),
            steps: StepDetector::new(step_threshold),
            calorie_factor_per_meter,
        }
    }

    pub fn record_geo(&mut self, sample: GeoSample) -> f64 {
        self.distance.push(sample)
    }

    pub fn record_motion(&mut self, sample: &MotionSample) -> bool {
        self.steps.push(sample)
    }

    pub fn add_elapsed(&mut self, hundredths: u64) {
        self.elapsed_hundredths = self.elapsed_hundredths.saturating_add(hundredths);
    }

    pub fn elapsed_hundredths(&self) -> u64 {
        self.elapsed_hundredths
    }

    pub fn distance_m(&self) -> f64 {
        self.distance.distance_m()
    }

    pub fn steps(&self) -> u64 {
        self.steps.steps()
    }

    pub fn max_speed_mps(&self) -> f64 {
        self.distance.max_speed_mps()
    }

    pub fn calories_kcal(&self) -> f64 {
        self.distance.distance_m() * self.calorie_factor_per_meter
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elapsed_hundredths: self.elapsed_hundredths,
            distance_meters: self.distance_m(),
            steps: self.steps(),
            max_speed_mps: self.max_speed_mps(),
            calories_kcal: self.calories_kcal(),
        }
    }

    /// Zero everything, keeping the configured factors.
    pub fn reset(&mut self) {
        self.elapsed_hundredths = 0;
        self.distance.reset();
        self.steps.reset();
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_CALORIE_FACTOR_PER_METER, DEFAULT_STEP_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Acceleration;
    use chrono::Utc;

    #[test]
    fn calories_follow_distance() {
        let mut metrics = RunMetrics::default();
        let north = (250.0 / EARTH_RADIUS_M).to_degrees();
        metrics.record_geo(GeoSample::new(Utc::now(), 0.0, 0.0, Some(3.2)));
        assert_eq!(metrics.calories_kcal(), 0.0);
        metrics.record_geo(GeoSample::new(Utc::now(), north, 0.0, Some(4.1)));

        let snap = metrics.snapshot();
        assert_eq!(snap.calories_kcal, snap.distance_meters * DEFAULT_CALORIE_FACTOR_PER_METER);
        assert!((snap.calories_kcal - 0.34).abs() < 1e-6);
        assert_eq!(snap.max_speed_mps, 4.1);
    }

    #[test]
    fn reset_zeroes_every_total() {
        let mut metrics = RunMetrics::default();
        metrics.add_elapsed(1234);
        metrics.record_motion(&MotionSample::new(Utc::now(), Acceleration { x: 2.0, y: 0.0, z: 0.0 }));
        metrics.record_geo(GeoSample::new(Utc::now(), 0.0, 0.0, Some(1.0)));
        metrics.record_geo(GeoSample::new(Utc::now(), 0.01, 0.0, None));
        assert!(metrics.distance_m() > 0.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(RunMetrics::default().snapshot()).unwrap();
        assert!(json.get("elapsedHundredths").is_some());
        assert!(json.get("caloriesKcal").is_some());
    }
}
