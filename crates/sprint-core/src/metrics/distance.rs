use crate::sensors::GeoSample;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Integrates position samples into a running distance and tracks the top
/// reported speed.
///
/// Accumulation is online and never revised: every hop between consecutive
/// samples counts, GPS jitter included.
#[derive(Debug, Clone, Default)]
pub struct DistanceAccumulator {
    previous: Option<GeoSample>,
    distance_m: f64,
    max_speed_mps: f64,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one sample and return the distance it added.
    pub fn push(&mut self, sample: GeoSample) -> f64 {
        let hop = match self.previous {
            Some(prev) => haversine_distance(prev.latitude, prev.longitude, sample.latitude, sample.longitude),
            None => 0.0,
        };
        // NaN coordinates would poison the total for the rest of the run.
        let hop = if hop.is_finite() { hop } else { 0.0 };
        self.distance_m += hop;
        if let Some(speed) = sample.speed_mps.filter(|s| s.is_finite() && *s >= 0.0) {
            self.max_speed_mps = self.max_speed_mps.max(speed);
        }
        self.previous = Some(sample);
        hop
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn max_speed_mps(&self) -> f64 {
        self.max_speed_mps
    }

    pub fn previous(&self) -> Option<&GeoSample> {
        self.previous.as_ref()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
