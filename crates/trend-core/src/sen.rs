//! Sen's slope: median of all pairwise rates of change.
//!
//! For every time-ordered pair of observed samples (i, j):
//!   rate_ij = (x_j − x_i) / ((t_j − t_i) / units_per_year)
//! The estimate is the median of the rates (mean of the two middle rates for
//! an even count). It is computed regardless of significance; masking is the
//! caller's job.
use crate::series::{Series, SECONDS_PER_YEAR};

#[derive(Debug, Clone, Copy)]
pub struct SenSlopeEstimator {
    /// Timestamp units per year.
    pub units_per_year: f64,
}

impl Default for SenSlopeEstimator {
    fn default() -> Self {
        Self { units_per_year: SECONDS_PER_YEAR }
    }
}

impl SenSlopeEstimator {
    pub fn new(units_per_year: f64) -> Self {
        Self { units_per_year }
    }

    /// All pairwise per-year rates, in (earlier, later) pair order.
    pub fn pairwise_rates(&self, series: &Series) -> Vec<f64> {
        let mut rates = Vec::new();
        self.pairwise_rates_into(series, &mut rates);
        rates
    }

    /// Buffer-reusing form of [`SenSlopeEstimator::pairwise_rates`]; clears `rates` first.
    pub fn pairwise_rates_into(&self, series: &Series, rates: &mut Vec<f64>) {
        rates.clear();
        let samples = series.samples();
        for (i, a) in samples.iter().enumerate() {
            let Some(vi) = a.value else { continue };
            for b in &samples[i + 1..] {
                let Some(vj) = b.value else { continue };
                let dt_years = (b.timestamp - a.timestamp) as f64 / self.units_per_year;
                rates.push((vj - vi) / dt_years);
            }
        }
    }

    /// Median pairwise rate, or None with fewer than two observed samples.
    pub fn estimate(&self, series: &Series) -> Option<f64> {
        let mut rates = Vec::new();
        self.estimate_with_buffer(series, &mut rates)
    }

    pub fn estimate_with_buffer(&self, series: &Series, rates: &mut Vec<f64>) -> Option<f64> {
        self.pairwise_rates_into(series, rates);
        median_in_place(rates)
    }
}

/// Median by selection; reorders `values`. None for an empty slice.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    let (lower, &mut upper_mid, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    if n % 2 == 1 {
        return Some(upper_mid);
    }
    let lower_mid = lower.iter().copied().max_by(f64::total_cmp)?;
    Some(0.5 * (lower_mid + upper_mid))
}
