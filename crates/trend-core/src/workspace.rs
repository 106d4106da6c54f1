//! Reusable per-worker scratch buffers for the per-location pipeline.
//!
//! One `Workspace` is created per tile and refilled for every location, so
//! the hot path allocates only when a series outgrows the previous one.
use crate::series::{Series, TimeAxis};
use crate::error::TrendResult;

#[derive(Debug, Default)]
pub struct Workspace {
    /// Raw values read from the source (NaN = missing).
    pub values: Vec<f32>,
    pub series: Series,
    /// Observed values in ascending order, for tie grouping.
    pub sorted: Vec<f64>,
    pub tie_sizes: Vec<usize>,
    /// Pairwise per-year rates, for the median.
    pub rates: Vec<f64>,
}

impl Workspace {
    /// Workspace sized for series of `periods` samples.
    pub fn with_periods(periods: usize) -> Self {
        let pairs = periods * periods.saturating_sub(1) / 2;
        Self {
            values: vec![f32::NAN; periods],
            series: Series::default(),
            sorted: Vec::with_capacity(periods),
            tie_sizes: Vec::with_capacity(periods),
            rates: Vec::with_capacity(pairs),
        }
    }

    /// Rebuild `series` from `values` on `axis`.
    pub fn load(&mut self, axis: &TimeAxis) -> TrendResult<()> {
        self.series.refill(axis, &self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rebuilds_series_without_reallocating_values() {
        let axis = TimeAxis::new(vec![0, 1, 2]).unwrap();
        let mut ws = Workspace::with_periods(3);
        assert_eq!(ws.values.len(), 3);
        assert!(ws.rates.capacity() >= 3);

        ws.values.copy_from_slice(&[1.0, f32::NAN, 2.0]);
        ws.load(&axis).unwrap();
        assert_eq!(ws.series.effective_len(), 2);

        ws.values.copy_from_slice(&[4.0, 5.0, 6.0]);
        ws.load(&axis).unwrap();
        assert_eq!(ws.series.effective_len(), 3);
    }
}
