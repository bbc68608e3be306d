use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;

/// Format hundredths of a second as `MM:SS:CC`. Minutes keep counting past
/// 99 rather than wrapping.
pub fn format_elapsed(hundredths: u64) -> String {
    let minutes = hundredths / 6000;
    let seconds = (hundredths / 100) % 60;
    let centis = hundredths % 100;
    format!("{minutes:02}:{seconds:02}:{centis:02}")
}

/// Inverse of [`format_elapsed`].
pub fn parse_elapsed(text: &str) -> Option<u64> {
    let mut parts = text.split(':');
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    let centis: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || seconds >= 60 || centis >= 100 {
        return None;
    }
    Some(minutes * 6000 + seconds * 100 + centis)
}

/// Summary of one completed run. Built once when the run ends and never
/// modified afterwards; serialized as a flat camelCase record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    date: NaiveDate,
    start_time: DateTime<Utc>,
    finish_time: DateTime<Utc>,
    time_elapsed: String,
    steps: u64,
    distance_meters: f64,
    calories_kcal: f64,
    max_speed_mps: f64,
}

impl RunRecord {
    /// Finalize a run from its last metrics snapshot. `date` is the start
    /// time's calendar day at `utc_offset_minutes`.
    pub fn finalize(
        start_time: DateTime<Utc>,
        finish_time: DateTime<Utc>,
        metrics: &MetricsSnapshot,
        utc_offset_minutes: i32,
    ) -> Self {
        let local = start_time + Duration::minutes(i64::from(utc_offset_minutes));
        Self {
            date: local.date_naive(),
            start_time,
            finish_time,
            time_elapsed: format_elapsed(metrics.elapsed_hundredths),
            steps: metrics.steps,
            distance_meters: metrics.distance_meters,
            calories_kcal: metrics.calories_kcal,
            max_speed_mps: metrics.max_speed_mps,
        }
    }

    /// Rebuild a record read back from storage.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        date: NaiveDate,
        start_time: DateTime<Utc>,
        finish_time: DateTime<Utc>,
        time_elapsed: String,
        steps: u64,
        distance_meters: f64,
        calories_kcal: f64,
        max_speed_mps: f64,
    ) -> Self {
        Self {
            date,
            start_time,
            finish_time,
            time_elapsed,
            steps,
            distance_meters,
            calories_kcal,
            max_speed_mps,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn finish_time(&self) -> DateTime<Utc> {
        self.finish_time
    }

    pub fn time_elapsed(&self) -> &str {
        &self.time_elapsed
    }

    pub fn elapsed_hundredths(&self) -> Option<u64> {
        parse_elapsed(&self.time_elapsed)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn calories_kcal(&self) -> f64 {
        self.calories_kcal
    }

    pub fn max_speed_mps(&self) -> f64 {
        self.max_speed_mps
    }
}
