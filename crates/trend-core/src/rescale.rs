//! Global percentile rescaling of a slope raster into [-1, 1].
//!
//! Anchors are the low/high percentiles of the non-missing cells:
//!   y = 2·(x − p_low) / (p_high − p_low) − 1
//!
//! The percentile pass is bounded in cost. Cells are first taken on a
//! systematic grid (every `stride`-th row and column inside the domain); if
//! more than `max_samples` valid values remain, seeded reservoir sampling
//! reduces them to that bound. Percentiles interpolate linearly between order
//! statistics at rank p/100 · (n − 1).
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, warn};

use crate::params::TrendConfig;
use crate::raster::{Domain, Raster};

/// Denominator used when the anchor range collapses to zero.
pub const RESCALE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileAnchors {
    pub low: f64,
    pub high: f64,
    /// Number of values the anchors were computed from.
    pub sample_size: usize,
}

impl PercentileAnchors {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high, sample_size: 0 }
    }

    /// `high − low`, or [`RESCALE_EPSILON`] when the anchors coincide.
    /// Small nonzero ranges are used as they are.
    pub fn span(&self) -> f64 {
        if self.is_degenerate() {
            RESCALE_EPSILON
        } else {
            self.high - self.low
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.high - self.low == 0.0
    }
}

/// Percentile `pct` (0–100) of an ascending slice, linearly interpolated.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[derive(Debug, Clone)]
pub struct PercentileRescaler {
    pub low_pct: f64,
    pub high_pct: f64,
    pub stride: usize,
    pub max_samples: usize,
    pub seed: u64,
    pub domain: Option<Domain>,
    pub clamp: bool,
}

impl PercentileRescaler {
    pub fn from_config(cfg: &TrendConfig) -> Self {
        Self {
            low_pct: cfg.percentile_low,
            high_pct: cfg.percentile_high,
            stride: cfg.spatial_sampling_resolution.max(1),
            max_samples: cfg.max_percentile_samples.max(2),
            seed: cfg.sampling_seed,
            domain: cfg.rescale_domain,
            clamp: cfg.clamp_rescaled,
        }
    }

    /// Bounded sample of the raster's valid cells inside the domain.
    pub fn sample(&self, raster: &Raster) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut reservoir: Vec<f64> = Vec::new();
        let mut seen = 0usize;

        for row in (0..raster.height).step_by(self.stride) {
            for col in (0..raster.width).step_by(self.stride) {
                let v = raster.get(row, col);
                if !v.is_finite() {
                    continue;
                }
                if let Some(d) = &self.domain {
                    let (lon, lat) = raster.coords(row, col);
                    if !d.contains(lon, lat) {
                        continue;
                    }
                }

                // Algorithm R: keep each of the `seen` values with equal probability.
                if reservoir.len() < self.max_samples {
                    reservoir.push(v as f64);
                } else {
                    let j = rng.gen_range(0..=seen);
                    if j < self.max_samples {
                        reservoir[j] = v as f64;
                    }
                }
                seen += 1;
            }
        }

        if seen > reservoir.len() {
            debug!(seen, kept = reservoir.len(), "percentile pass down-sampled");
        }
        reservoir
    }

    /// Compute the anchors. None when no valid cell falls inside the domain.
    pub fn fit(&self, raster: &Raster) -> Option<PercentileAnchors> {
        let mut values = self.sample(raster);
        if values.is_empty() {
            warn!("percentile pass found no valid cells; rescaled raster will be empty");
            return None;
        }
        values.sort_unstable_by(f64::total_cmp);

        let anchors = PercentileAnchors {
            low: percentile_sorted(&values, self.low_pct)?,
            high: percentile_sorted(&values, self.high_pct)?,
            sample_size: values.len(),
        };
        if anchors.is_degenerate() {
            warn!(low = anchors.low, high = anchors.high, "zero rescale range; using epsilon denominator");
        }
        debug!(low = anchors.low, high = anchors.high, n = anchors.sample_size, "percentile anchors");
        Some(anchors)
    }

    /// Map one value. Missing stays missing.
    #[inline]
    pub fn rescale_value(&self, x: f64, anchors: &PercentileAnchors) -> f64 {
        if !x.is_finite() {
            return f64::NAN;
        }
        let y = 2.0 * (x - anchors.low) / anchors.span() - 1.0;
        if self.clamp {
            y.clamp(-1.0, 1.0)
        } else {
            y
        }
    }

    pub fn apply(&self, raster: &Raster, anchors: &PercentileAnchors) -> Raster {
        let mut out = raster.missing_like();
        for (dst, &src) in out.data.iter_mut().zip(&raster.data) {
            *dst = self.rescale_value(src as f64, anchors) as f32;
        }
        out
    }

    /// Fit anchors and apply them. With no valid cells the output is all missing.
    pub fn rescale(&self, raster: &Raster) -> (Raster, Option<PercentileAnchors>) {
        match self.fit(raster) {
            Some(anchors) => (self.apply(raster, &anchors), Some(anchors)),
            None => (raster.missing_like(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rescaler(low: f64, high: f64, clamp: bool) -> PercentileRescaler {
        PercentileRescaler::from_config(&TrendConfig {
            percentile_low: low,
            percentile_high: high,
            clamp_rescaled: clamp,
            ..Default::default()
        })
    }

    fn ramp(n: usize) -> Raster {
        Raster::from_vec(n, 1, (0..n).map(|i| i as f32).collect()).unwrap()
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&v, 0.0), Some(1.0));
        assert_eq!(percentile_sorted(&v, 100.0), Some(5.0));
        assert_eq!(percentile_sorted(&v, 50.0), Some(3.0));
        assert_abs_diff_eq!(percentile_sorted(&v, 2.0).unwrap(), 1.08, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile_sorted(&v, 98.0).unwrap(), 4.92, epsilon = 1e-12);
        assert_eq!(percentile_sorted(&[], 50.0), None);
    }

    #[test]
    fn anchors_map_to_unit_interval() {
        let r = rescaler(2.0, 98.0, false);
        let anchors = PercentileAnchors::new(0.0, 1.0);
        assert_eq!(r.rescale_value(0.5, &anchors), 0.0);
        assert_eq!(r.rescale_value(1.0, &anchors), 1.0);
        assert_eq!(r.rescale_value(0.0, &anchors), -1.0);
        assert!(r.rescale_value(f64::NAN, &anchors).is_nan());
    }

    #[test]
    fn out_of_range_values_clamp_only_when_enabled() {
        let anchors = PercentileAnchors::new(0.0, 1.0);
        assert_eq!(rescaler(2.0, 98.0, false).rescale_value(2.0, &anchors), 3.0);
        assert_eq!(rescaler(2.0, 98.0, true).rescale_value(2.0, &anchors), 1.0);
        assert_eq!(rescaler(2.0, 98.0, true).rescale_value(-7.0, &anchors), -1.0);
    }

    #[test]
    fn extremes_map_to_boundaries() {
        let raster = ramp(101);
        let full = rescaler(0.0, 100.0, false);
        let (out, anchors) = full.rescale(&raster);
        let anchors = anchors.unwrap();
        assert_eq!((anchors.low, anchors.high), (0.0, 100.0));
        assert_abs_diff_eq!(out.get(0, 0), -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.get(0, 100), 1.0, epsilon = 1e-6);

        let clipped = rescaler(2.0, 98.0, true);
        let (out, anchors) = clipped.rescale(&raster);
        let anchors = anchors.unwrap();
        assert_abs_diff_eq!(anchors.low, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(anchors.high, 98.0, epsilon = 1e-9);
        assert_eq!(out.get(0, 0), -1.0);
        assert_eq!(out.get(0, 100), 1.0);
        assert_abs_diff_eq!(out.get(0, 50), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rescaling_in_range_values_is_stable() {
        let raster = ramp(51);
        let r = rescaler(0.0, 100.0, true);
        let (once, _) = r.rescale(&raster);
        let (twice, _) = r.rescale(&once);
        for (a, b) in once.data.iter().zip(&twice.data) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn zero_range_uses_epsilon_without_infinities() {
        let raster = Raster::new(4, 4, 0.0, 1.0, 0.0, 1.0, 0.25);
        let (out, anchors) = rescaler(2.0, 98.0, false).rescale(&raster);
        assert!(anchors.unwrap().is_degenerate());
        assert!(out.data.iter().all(|v| v.is_finite()));
        assert!(out.data.iter().all(|&v| v == -1.0));
    }

    #[test]
    fn tiny_nonzero_range_still_reaches_both_ends() {
        let raster = Raster::from_vec(101, 1, (0..101).map(|i| i as f32 * 5e-9).collect()).unwrap();
        let (out, anchors) = rescaler(0.0, 100.0, false).rescale(&raster);
        let anchors = anchors.unwrap();
        assert!(!anchors.is_degenerate());
        assert!(anchors.span() < RESCALE_EPSILON);
        assert_abs_diff_eq!(out.get(0, 0), -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.get(0, 100), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.get(0, 50), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn missing_cells_are_ignored_and_preserved() {
        let mut raster = ramp(5);
        raster.set(0, 2, f32::NAN);
        let r = rescaler(0.0, 100.0, false);
        assert_eq!(r.sample(&raster).len(), 4);
        let (out, _) = r.rescale(&raster);
        assert!(out.is_missing(0, 2));

        let empty = Raster::missing(3, 3);
        let (out, anchors) = r.rescale(&empty);
        assert!(anchors.is_none());
        assert_eq!(out.valid_count(), 0);
    }

    #[test]
    fn stride_coarsens_the_sample() {
        let raster = Raster::new(10, 10, 0.0, 1.0, 0.0, 1.0, 1.0);
        let mut r = rescaler(2.0, 98.0, false);
        r.stride = 3;
        // rows and cols 0, 3, 6, 9
        assert_eq!(r.sample(&raster).len(), 16);
    }

    #[test]
    fn reservoir_bounds_the_sample_deterministically() {
        let raster = Raster::from_vec(100, 100, (0..10_000).map(|i| i as f32).collect()).unwrap();
        let mut r = rescaler(2.0, 98.0, false);
        r.max_samples = 500;
        let a = r.sample(&raster);
        let b = r.sample(&raster);
        assert_eq!(a.len(), 500);
        assert_eq!(a, b);

        let anchors = r.fit(&raster).unwrap();
        assert_eq!(anchors.sample_size, 500);
        assert!((anchors.low - 200.0).abs() < 300.0, "p2 ≈ 200, got {}", anchors.low);
        assert!((anchors.high - 9800.0).abs() < 300.0, "p98 ≈ 9800, got {}", anchors.high);
    }

    #[test]
    fn domain_restricts_the_percentile_pass() {
        let mut raster = Raster::new(4, 1, 0.0, 3.0, 0.0, 0.0, 0.0);
        raster.data = vec![0.0, 1.0, 2.0, 100.0];
        let mut r = rescaler(0.0, 100.0, false);
        r.domain = Some(Domain { min_lon: 0.0, max_lon: 2.0, min_lat: -1.0, max_lat: 1.0 });
        let anchors = r.fit(&raster).unwrap();
        assert_eq!((anchors.low, anchors.high), (0.0, 2.0));
        // Cells outside the domain are still rescaled with the domain's anchors.
        assert_eq!(r.apply(&raster, &anchors).get(0, 3), 99.0);
    }
}
