//! Annual ecosystem quality index (EQI) from satellite indicators.
//!
//! Per cell and year:
//!   EFI (function)  = mean of min–max normalised five-year means of LAI, NDVI, GPP
//!   ESI (stability) = variance / mean of the per-year EFI over the same window
//!   ETI (threat)    = Σ_c w_c · fraction_c / 3 over ten land-cover classes
//!   EQI             = 0.43·(1 − ESI) + 0.37·EFI + 0.20·(1 − ETI)
//!
//! Normalisation uses each cell's own minimum and maximum over the whole
//! record. The resulting stack feeds straight into the trend engine.
use std::ops::RangeInclusive;

use serde::Deserialize;

use crate::error::{TrendError, TrendResult};
use crate::raster::Raster;
use crate::series::TimeAxis;
use crate::stack::SeriesStack;

pub const WINDOW_YEARS: i32 = 5;

/// Per-class threat weights, in land-cover class order.
pub const LAND_COVER_WEIGHTS: [f32; 10] = [2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 2.0, 1.0];

pub const STABILITY_WEIGHT: f32 = 0.43;
pub const FUNCTION_WEIGHT: f32 = 0.37;
pub const THREAT_WEIGHT: f32 = 0.20;

/// Replaces a zero min–max range.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Yearly indicator rasters. Index `k` of every vector is year `first_year + k`.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorRecord {
    pub first_year: i32,
    pub lai: Vec<Raster>,
    pub ndvi: Vec<Raster>,
    pub gpp: Vec<Raster>,
    /// Per year, one fraction raster per land-cover class (`LAND_COVER_WEIGHTS.len()` classes).
    pub land_cover: Vec<Vec<Raster>>,
}

/// Intermediate and final composite layers, one raster per year each.
#[derive(Debug, Clone)]
pub struct CompositeLayers {
    pub first_year: i32,
    pub efi: Vec<Raster>,
    pub esi: Vec<Raster>,
    pub eti: Vec<Raster>,
    pub eqi: Vec<Raster>,
}

impl CompositeLayers {
    /// EQI layers as a stack on a regular annual axis.
    pub fn quality_stack(&self, units_per_year: f64) -> TrendResult<SeriesStack> {
        let axis = TimeAxis::annual(self.first_year, self.eqi.len(), units_per_year)?;
        SeriesStack::from_bands(axis, &self.eqi)
    }
}

/// Five consecutive years around `year`, shifted inward at the ends of
/// `[start, end]`. Shorter records yield the whole record.
pub fn five_year_window(year: i32, start: i32, end: i32) -> RangeInclusive<i32> {
    let latest_start = start.max(end - (WINDOW_YEARS - 1));
    let y0 = (year - WINDOW_YEARS / 2).clamp(start, latest_start);
    let y1 = (y0 + WINDOW_YEARS - 1).min(end);
    y0..=y1
}

/// Min–max normalise into [0, 1]. NaN propagates.
#[inline]
pub fn min_max_normalize(v: f32, min: f32, max: f32) -> f32 {
    let mut range = max - min;
    if range == 0.0 {
        range = NORMALIZE_EPSILON;
    }
    ((v - min) / range).clamp(0.0, 1.0)
}

/// Weighted sum of the three sub-indices.
#[inline]
pub fn quality_index(efi: f32, esi: f32, eti: f32) -> f32 {
    STABILITY_WEIGHT * (1.0 - esi) + FUNCTION_WEIGHT * efi + THREAT_WEIGHT * (1.0 - eti)
}

/// Weighted land-cover threat score for one cell. NaN if any fraction is missing.
pub fn threat_index(fractions: &[f32]) -> f32 {
    let sum: f32 = fractions.iter().zip(LAND_COVER_WEIGHTS.iter()).map(|(f, w)| f * w).sum();
    sum / 3.0
}

/// Mean of the finite values; NaN when there are none.
fn nan_mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, n) = values.filter(|v| v.is_finite()).fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if n == 0 {
        f32::NAN
    } else {
        (sum / n as f64) as f32
    }
}

/// Per-cell (min, max) across all years; NaN where every year is missing.
fn cell_extremes(layers: &[Raster]) -> (Vec<f32>, Vec<f32>) {
    let cells = layers[0].len();
    let mut min = vec![f32::NAN; cells];
    let mut max = vec![f32::NAN; cells];
    for layer in layers {
        for (i, &v) in layer.data.iter().enumerate() {
            if !v.is_finite() {
                continue;
            }
            if min[i].is_nan() || v < min[i] {
                min[i] = v;
            }
            if max[i].is_nan() || v > max[i] {
                max[i] = v;
            }
        }
    }
    (min, max)
}

fn check_record(rec: &IndicatorRecord) -> TrendResult<()> {
    let years = rec.lai.len();
    if years == 0 {
        return Err(TrendError::EmptyTimeAxis);
    }
    for len in [rec.ndvi.len(), rec.gpp.len(), rec.land_cover.len()] {
        if len != years {
            return Err(TrendError::LengthMismatch { expected: years, actual: len });
        }
    }
    for classes in &rec.land_cover {
        if classes.len() != LAND_COVER_WEIGHTS.len() {
            return Err(TrendError::LengthMismatch { expected: LAND_COVER_WEIGHTS.len(), actual: classes.len() });
        }
    }

    let grid = &rec.lai[0];
    let all = rec.lai.iter().chain(&rec.ndvi).chain(&rec.gpp).chain(rec.land_cover.iter().flatten());
    for r in all {
        r.check_len()?;
        if !r.same_grid(grid) {
            return Err(TrendError::ShapeMismatch {
                expected_width: grid.width,
                expected_height: grid.height,
                width: r.width,
                height: r.height,
            });
        }
    }
    Ok(())
}

/// Build EFI, ESI, ETI and EQI for every year of the record.
pub fn compute_layers(rec: &IndicatorRecord) -> TrendResult<CompositeLayers> {
    check_record(rec)?;

    let years = rec.lai.len();
    let start = rec.first_year;
    let end = start + years as i32 - 1;
    let template = rec.lai[0].missing_like();
    let cells = template.len();

    let indicators = [&rec.lai, &rec.ndvi, &rec.gpp];
    let extremes: Vec<(Vec<f32>, Vec<f32>)> = indicators.iter().map(|layers| cell_extremes(layers)).collect();

    // Per-year EFI from that year's normalised indicators alone.
    let mut efi_one = vec![template.clone(); years];
    for (k, layer) in efi_one.iter_mut().enumerate() {
        for i in 0..cells {
            layer.data[i] = nan_mean(indicators.iter().zip(&extremes).map(|(ind, (lo, hi))| {
                min_max_normalize(ind[k].data[i], lo[i], hi[i])
            }));
        }
    }

    let mut out = CompositeLayers {
        first_year: start,
        efi: vec![template.clone(); years],
        esi: vec![template.clone(); years],
        eti: vec![template.clone(); years],
        eqi: vec![template; years],
    };

    for k in 0..years {
        let year = start + k as i32;
        let window: Vec<usize> = five_year_window(year, start, end).map(|y| (y - start) as usize).collect();

        for i in 0..cells {
            let efi = nan_mean(indicators.iter().zip(&extremes).map(|(ind, (lo, hi))| {
                let window_mean = nan_mean(window.iter().map(|&w| ind[w].data[i]));
                min_max_normalize(window_mean, lo[i], hi[i])
            }));

            let series: Vec<f32> = window.iter().map(|&w| efi_one[w].data[i]).filter(|v| v.is_finite()).collect();
            let esi = if series.is_empty() {
                f32::NAN
            } else {
                let n = series.len() as f32;
                let mean = series.iter().sum::<f32>() / n;
                let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
                if mean.abs() < NORMALIZE_EPSILON {
                    f32::NAN
                } else {
                    var / mean
                }
            };

            let fractions: Vec<f32> = rec.land_cover[k].iter().map(|c| c.data[i]).collect();
            let eti = threat_index(&fractions);

            out.efi[k].data[i] = efi;
            out.esi[k].data[i] = esi;
            out.eti[k].data[i] = eti;
            out.eqi[k].data[i] = quality_index(efi, esi, eti);
        }
    }

    Ok(out)
}
