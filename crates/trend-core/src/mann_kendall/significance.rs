//! Standardised Mann–Kendall statistic and its significance.
use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;

use super::pairwise::kendall_s;
use super::ties::{group_factor, tie_correction, tie_group_sizes_into};
use crate::series::Series;

/// Reference significance threshold.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.005;

/// Per-location outcome of the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStatus {
    /// p ≤ threshold.
    Reportable,
    /// Test ran; p above threshold.
    NotSignificant,
    /// Fewer than two observed samples.
    InsufficientData,
    /// Tie-corrected variance ≤ 0 (every observed value equal).
    DegenerateVariance,
}

/// Full result of the test for one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendTest {
    pub s: i64,
    /// Observed (non-missing) sample count.
    pub n: usize,
    pub tie_correction: u64,
    /// Var(S) under the null; 0 when undefined.
    pub variance: f64,
    pub z: f64,
    /// Upper-tail normal probability of |Z|, in [0, 0.5] when tested, 1 otherwise.
    pub p_value: f64,
    pub status: TestStatus,
}

impl TrendTest {
    #[inline]
    pub fn is_reportable(&self) -> bool {
        self.status == TestStatus::Reportable
    }

    fn untestable(s: i64, n: usize, tie_correction: u64, status: TestStatus) -> Self {
        Self { s, n, tie_correction, variance: 0.0, z: 0.0, p_value: 1.0, status }
    }
}

/// Continuity-corrected standard score of S.
pub fn standardize(s: i64, variance: f64) -> f64 {
    let sd = variance.sqrt();
    match s {
        0 => 0.0,
        s if s > 0 => (s - 1) as f64 / sd,
        s => (s + 1) as f64 / sd,
    }
}

/// 1 − Φ(|z|) for the standard normal distribution.
pub fn upper_tail_probability(z: f64) -> f64 {
    0.5 * erfc(z.abs() / SQRT_2)
}

/// Applies the Mann–Kendall test against a fixed significance threshold.
#[derive(Debug, Clone, Copy)]
pub struct SignificanceTester {
    pub threshold: f64,
}

impl Default for SignificanceTester {
    fn default() -> Self {
        Self { threshold: DEFAULT_SIGNIFICANCE }
    }
}

impl SignificanceTester {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn test(&self, series: &Series) -> TrendTest {
        let mut sorted = Vec::with_capacity(series.len());
        let mut sizes = Vec::new();
        self.test_with_buffers(series, &mut sorted, &mut sizes)
    }

    /// Same as [`SignificanceTester::test`] with caller-owned scratch buffers.
    pub fn test_with_buffers(&self, series: &Series, sorted: &mut Vec<f64>, sizes: &mut Vec<usize>) -> TrendTest {
        let n = series.effective_len();
        if n < 2 {
            return TrendTest::untestable(0, n, 0, TestStatus::InsufficientData);
        }

        let s = kendall_s(series);
        tie_group_sizes_into(series, sorted, sizes);
        let ties = tie_correction(sizes);

        let numerator = group_factor(n) as f64 - ties as f64;
        let variance = numerator / 18.0;
        if !(variance > 0.0 && variance.is_finite()) {
            return TrendTest::untestable(s, n, ties, TestStatus::DegenerateVariance);
        }

        let z = standardize(s, variance);
        let p_value = upper_tail_probability(z);
        let status = if p_value <= self.threshold {
            TestStatus::Reportable
        } else {
            TestStatus::NotSignificant
        };

        TrendTest { s, n, tie_correction: ties, variance, z, p_value, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn yearly(values: &[f64]) -> Series {
        let pts: Vec<(i64, f64)> = values.iter().enumerate().map(|(i, &v)| (2002 + i as i64, v)).collect();
        Series::from_points(&pts).unwrap()
    }

    #[test]
    fn increasing_five_year_series_is_not_reportable_at_reference_threshold() {
        let t = SignificanceTester::default().test(&yearly(&[0.1, 0.2, 0.3, 0.4, 0.5]));
        assert_eq!(t.s, 10);
        assert_eq!(t.n, 5);
        assert_eq!(t.tie_correction, 0);
        assert_abs_diff_eq!(t.variance, 300.0 / 18.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t.z, 9.0 / (300.0f64 / 18.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(t.z, 2.2045, epsilon = 1e-4);
        assert_abs_diff_eq!(t.p_value, 0.01374, epsilon = 1e-4);
        assert_eq!(t.status, TestStatus::NotSignificant);
    }

    #[test]
    fn same_series_is_reportable_at_looser_threshold() {
        let t = SignificanceTester::new(0.05).test(&yearly(&[0.1, 0.2, 0.3, 0.4, 0.5]));
        assert!(t.is_reportable());
    }

    #[test]
    fn long_monotone_series_is_reportable() {
        let values: Vec<f64> = (0..23).map(|i| 0.3 + 0.01 * i as f64).collect();
        let t = SignificanceTester::default().test(&yearly(&values));
        assert!(t.p_value < 1e-6, "p = {}", t.p_value);
        assert!(t.is_reportable());
        assert!(t.z > 0.0);
    }

    #[test]
    fn decreasing_series_has_negative_z() {
        let values: Vec<f64> = (0..15).map(|i| -(i as f64)).collect();
        let t = SignificanceTester::default().test(&yearly(&values));
        assert_eq!(t.s, -105);
        assert!(t.z < 0.0);
        assert!(t.is_reportable());
    }

    #[test]
    fn constant_series_is_never_reportable() {
        let t = SignificanceTester::new(1.0).test(&yearly(&[0.0; 5]));
        assert_eq!(t.s, 0);
        assert_eq!(t.tie_correction, 300);
        assert_eq!(t.z, 0.0);
        assert_eq!(t.p_value, 1.0);
        assert_eq!(t.status, TestStatus::DegenerateVariance);
    }

    #[test]
    fn too_few_samples_short_circuit() {
        let one = yearly(&[1.0, f64::NAN, f64::NAN]);
        let t = SignificanceTester::new(1.0).test(&one);
        assert_eq!(t.status, TestStatus::InsufficientData);
        assert_eq!(t.n, 1);
        assert_eq!(t.p_value, 1.0);

        let empty = Series::default();
        assert_eq!(SignificanceTester::default().test(&empty).status, TestStatus::InsufficientData);
    }

    #[test]
    fn ties_shrink_variance() {
        let plain = SignificanceTester::default().test(&yearly(&[1.0, 2.0, 3.0, 4.0]));
        let tied = SignificanceTester::default().test(&yearly(&[1.0, 2.0, 2.0, 3.0]));
        assert_eq!(tied.tie_correction, 18);
        assert_abs_diff_eq!(plain.variance - tied.variance, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn standardize_applies_continuity_correction() {
        assert_eq!(standardize(0, 4.0), 0.0);
        assert_eq!(standardize(5, 4.0), 2.0);
        assert_eq!(standardize(-5, 4.0), -2.0);
    }

    #[test]
    fn upper_tail_matches_known_quantiles() {
        assert_abs_diff_eq!(upper_tail_probability(0.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(upper_tail_probability(1.959964), 0.025, epsilon = 1e-6);
        assert_abs_diff_eq!(upper_tail_probability(-2.575829), 0.005, epsilon = 1e-6);
    }
}
