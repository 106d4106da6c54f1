//! Per-location time series and the shared time axis.
//!
//! Timestamps are integers in an arbitrary unit (seconds by default). Slopes
//! are converted to per-year values with the configured units-per-year factor.
use serde::{Deserialize, Serialize};

use crate::error::{TrendError, TrendResult};

/// Seconds in a fixed 365-day year.
pub const SECONDS_PER_YEAR: f64 = 86_400.0 * 365.0;

/// Strictly increasing sample instants shared by every location of a grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct TimeAxis {
    timestamps: Vec<i64>,
}

impl TimeAxis {
    pub fn new(timestamps: Vec<i64>) -> TrendResult<Self> {
        if timestamps.is_empty() {
            return Err(TrendError::EmptyTimeAxis);
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TrendError::NonIncreasingTimeAxis { index: i + 1 });
        }
        Ok(Self { timestamps })
    }

    /// Regular annual axis of `count` years starting at `first_year`.
    ///
    /// Years are fixed-length (`units_per_year` units each), counted from 1970,
    /// so consecutive periods are exactly one year apart in slope units.
    pub fn annual(first_year: i32, count: usize, units_per_year: f64) -> TrendResult<Self> {
        let timestamps = (0..count)
            .map(|k| ((first_year as f64 - 1970.0 + k as f64) * units_per_year).round() as i64)
            .collect();
        Self::new(timestamps)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }
}

impl TryFrom<Vec<i64>> for TimeAxis {
    type Error = TrendError;

    fn try_from(v: Vec<i64>) -> TrendResult<Self> {
        Self::new(v)
    }
}

impl From<TimeAxis> for Vec<i64> {
    fn from(axis: TimeAxis) -> Self {
        axis.timestamps
    }
}

/// One observation: an instant and a value, or a missing marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: Option<f64>,
}

/// One location's samples in timestamp order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Build a series from samples. Returns an error unless timestamps are
    /// strictly increasing. Non-finite values are stored as missing.
    pub fn new(mut samples: Vec<Sample>) -> TrendResult<Self> {
        if let Some(i) = samples.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(TrendError::NonIncreasingTimeAxis { index: i + 1 });
        }
        for s in &mut samples {
            s.value = s.value.filter(|v| v.is_finite());
        }
        Ok(Self { samples })
    }

    /// Build a series from samples in any order; they are sorted by timestamp.
    /// Duplicate timestamps are rejected.
    pub fn from_unordered(mut samples: Vec<Sample>) -> TrendResult<Self> {
        samples.sort_by_key(|s| s.timestamp);
        Self::new(samples)
    }

    /// Convenience constructor from `(timestamp, value)` pairs with no gaps.
    pub fn from_points(points: &[(i64, f64)]) -> TrendResult<Self> {
        Self::new(
            points
                .iter()
                .map(|&(timestamp, v)| Sample { timestamp, value: v.is_finite().then_some(v) })
                .collect(),
        )
    }

    /// Build from a raw value slice on a shared axis. Non-finite values are missing.
    pub fn from_axis(axis: &TimeAxis, values: &[f32]) -> TrendResult<Self> {
        let mut series = Self::default();
        series.refill(axis, values)?;
        Ok(series)
    }

    /// Replace the contents in place, reusing the allocation.
    pub fn refill(&mut self, axis: &TimeAxis, values: &[f32]) -> TrendResult<()> {
        if values.len() != axis.len() {
            return Err(TrendError::LengthMismatch { expected: axis.len(), actual: values.len() });
        }
        self.samples.clear();
        self.samples.extend(axis.timestamps().iter().zip(values).map(|(&timestamp, &v)| Sample {
            timestamp,
            value: v.is_finite().then_some(v as f64),
        }));
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Non-missing samples as `(timestamp, value)`, in time order.
    pub fn observed(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.samples.iter().filter_map(|s| s.value.map(|v| (s.timestamp, v)))
    }

    /// Effective sample count (non-missing values).
    pub fn effective_len(&self) -> usize {
        self.samples.iter().filter(|s| s.value.is_some()).count()
    }
}
