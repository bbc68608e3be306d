//! Sensor collaborators and the samplers that wrap them.
//!
//! The platform side (GPS, accelerometer) is reached through the
//! [`LocationStream`] and [`MotionStream`] traits. A stream pushes raw
//! readings into a sink handed to it at `start`; the sink normalizes and
//! timestamps each reading and forwards it to the owning session's inbox as a
//! [`SessionInput`](crate::session::SessionInput).
//!
//! Sinks are gated by their subscription: once a sampler stops, late readings
//! pushed by the platform are dropped instead of reaching the session.

mod sampler;
mod scripted;
mod sink;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;

pub use sampler::{GeoSampler, MotionSampler};
pub use scripted::{ScriptedLocationStream, ScriptedMotionStream};
pub use sink::{LocationSink, MotionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Location,
    Motion,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Location => f.write_str("location"),
            SensorKind::Motion => f.write_str("motion"),
        }
    }
}

/// Requested location accuracy, ordered from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Lowest,
    Low,
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Options passed to [`LocationStream::start`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationOptions {
    pub accuracy: Accuracy,
    pub min_interval_ms: u64,
    pub min_distance_m: f64,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::Highest,
            min_interval_ms: 1000,
            min_distance_m: 1.0,
        }
    }
}

/// A raw position reading as delivered by the platform.
///
/// `speed` may be absent or negative, both meaning "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: Option<f64>,
}

/// A raw accelerometer reading, in g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A normalized position sample. `speed_mps` is `None` when the platform did
/// not report a usable speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: Option<f64>,
}

impl GeoSample {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64, speed_mps: Option<f64>) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            speed_mps: speed_mps.filter(|s| s.is_finite() && *s >= 0.0),
        }
    }
}

impl From<LocationFix> for GeoSample {
    fn from(fix: LocationFix) -> Self {
        GeoSample::new(fix.timestamp, fix.latitude, fix.longitude, fix.speed)
    }
}

/// A timestamped tri-axis acceleration sample, in g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub timestamp: DateTime<Utc>,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

impl MotionSample {
    pub fn new(timestamp: DateTime<Utc>, reading: Acceleration) -> Self {
        Self {
            timestamp,
            ax: reading.x,
            ay: reading.y,
            az: reading.z,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.ax * self.ax + self.ay * self.ay + self.az * self.az).sqrt()
    }
}

/// An active platform subscription. Dropping the handle without calling
/// `stop` is allowed; samplers always call it explicitly.
pub trait SensorSubscription: Send {
    fn stop(&mut self);
}

/// Platform location streaming.
pub trait LocationStream: Send {
    /// Start delivering fixes into `sink` until the returned subscription is
    /// stopped. Must fail fast: a refusal is reported synchronously.
    fn start(
        &mut self,
        options: &LocationOptions,
        sink: LocationSink,
    ) -> Result<Box<dyn SensorSubscription>, SensorError>;
}

/// Platform accelerometer streaming.
pub trait MotionStream: Send {
    fn start(
        &mut self,
        update_interval_ms: u64,
        sink: MotionSink,
    ) -> Result<Box<dyn SensorSubscription>, SensorError>;
}
