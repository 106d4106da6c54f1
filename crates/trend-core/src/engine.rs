//! Trend engine: drives the per-location pipeline over a grid.
//!
//! Pipeline order:
//!   1. Per location, in row-band tiles (parallel with the `threading` feature):
//!      Mann–Kendall test → Sen's slope → mask by significance.
//!   2. Barrier: every tile finishes.
//!   3. Global percentile pass and rescaling of the masked slope raster.
//!
//! Per-location failures never abort the run; they become missing cells.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::Serialize;
use tracing::{debug, info};

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::error::{ConfigError, TrendError, TrendResult};
use crate::mann_kendall::{SignificanceTester, TestStatus, TrendTest};
use crate::params::TrendConfig;
use crate::raster::Raster;
use crate::rescale::{PercentileAnchors, PercentileRescaler};
use crate::sen::SenSlopeEstimator;
use crate::series::Series;
use crate::stack::TimeSeriesSource;
use crate::workspace::Workspace;

/// Result of the per-location pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationTrend {
    pub test: TrendTest,
    /// Sen's slope in value units per year, before masking.
    pub slope: Option<f64>,
}

impl LocationTrend {
    /// Slope if the trend is reportable, else None. A reportable flat trend is `Some(0.0)`.
    pub fn masked_slope(&self) -> Option<f64> {
        if self.test.is_reportable() {
            self.slope
        } else {
            None
        }
    }
}

/// Per-status location counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub reportable: usize,
    pub not_significant: usize,
    pub insufficient_data: usize,
    pub degenerate_variance: usize,
    pub tiles: usize,
}

impl RunSummary {
    fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Reportable => self.reportable += 1,
            TestStatus::NotSignificant => self.not_significant += 1,
            TestStatus::InsufficientData => self.insufficient_data += 1,
            TestStatus::DegenerateVariance => self.degenerate_variance += 1,
        }
    }

    fn merge(mut self, other: RunSummary) -> RunSummary {
        self.reportable += other.reportable;
        self.not_significant += other.not_significant;
        self.insufficient_data += other.insufficient_data;
        self.degenerate_variance += other.degenerate_variance;
        self.tiles += other.tiles;
        self
    }

    pub fn locations(&self) -> usize {
        self.reportable + self.not_significant + self.insufficient_data + self.degenerate_variance
    }
}

/// Per-location rasters, before the global percentile barrier.
#[derive(Debug, Clone)]
pub struct SlopeStage {
    /// Masked Sen's slope (value units per year); missing where not reportable.
    pub slope: Raster,
    /// p-value; missing where fewer than two samples were observed.
    pub significance: Raster,
    /// Standardised statistic Z; missing where fewer than two samples were observed.
    pub z_score: Raster,
    pub summary: RunSummary,
}

/// Full engine output.
#[derive(Debug, Clone)]
pub struct TrendOutput {
    /// Masked slope rescaled by the global percentile anchors.
    pub rescaled: Raster,
    pub slope: Raster,
    pub significance: Raster,
    pub z_score: Raster,
    /// None when no location was reportable.
    pub anchors: Option<PercentileAnchors>,
    pub summary: RunSummary,
}

pub struct TrendEngine {
    config: TrendConfig,
    tester: SignificanceTester,
    estimator: SenSlopeEstimator,
    rescaler: PercentileRescaler,
}

impl TrendEngine {
    /// Validate the configuration and build the engine.
    pub fn new(config: TrendConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tester: SignificanceTester::new(config.significance_threshold),
            estimator: SenSlopeEstimator::new(config.time_unit_conversion),
            rescaler: PercentileRescaler::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    pub fn rescaler(&self) -> &PercentileRescaler {
        &self.rescaler
    }

    /// Run the per-location pipeline on one series.
    pub fn analyze(&self, series: &Series) -> LocationTrend {
        let mut sorted = Vec::new();
        let mut sizes = Vec::new();
        let mut rates = Vec::new();
        self.analyze_with(series, &mut sorted, &mut sizes, &mut rates)
    }

    fn analyze_with(&self, series: &Series, sorted: &mut Vec<f64>, sizes: &mut Vec<usize>, rates: &mut Vec<f64>) -> LocationTrend {
        let test = self.tester.test_with_buffers(series, sorted, sizes);
        let slope = self.estimator.estimate_with_buffer(series, rates);
        LocationTrend { test, slope }
    }

    /// Run the pipeline on the series currently loaded in `ws`.
    pub fn analyze_in(&self, ws: &mut Workspace) -> LocationTrend {
        let Workspace { series, sorted, tie_sizes, rates, .. } = ws;
        self.analyze_with(series, sorted, tie_sizes, rates)
    }

    /// Full run: per-location stage, barrier, then percentile rescaling.
    pub fn run<S: TimeSeriesSource>(&self, source: &S) -> TrendResult<TrendOutput> {
        self.run_with_cancel(source, &AtomicBool::new(false))
    }

    /// Full run that stops between tiles once `cancel` is set.
    pub fn run_with_cancel<S: TimeSeriesSource>(&self, source: &S, cancel: &AtomicBool) -> TrendResult<TrendOutput> {
        let stage = self.compute_slopes(source, cancel)?;

        let (rescaled, anchors) = self.rescaler.rescale(&stage.slope);

        info!(
            width = source.width(),
            height = source.height(),
            periods = source.axis().len(),
            reportable = stage.summary.reportable,
            not_significant = stage.summary.not_significant,
            insufficient = stage.summary.insufficient_data,
            degenerate = stage.summary.degenerate_variance,
            "trend run complete"
        );

        Ok(TrendOutput {
            rescaled,
            slope: stage.slope,
            significance: stage.significance,
            z_score: stage.z_score,
            anchors,
            summary: stage.summary,
        })
    }

    /// Per-location stage only: masked slope, p-value and Z rasters.
    pub fn compute_slopes<S: TimeSeriesSource>(&self, source: &S, cancel: &AtomicBool) -> TrendResult<SlopeStage> {
        let (width, height) = (source.width(), source.height());
        let (min_lon, max_lon, min_lat, max_lat) = source.bounds();
        let blank = Raster::new(width, height, min_lon, max_lon, min_lat, max_lat, f32::NAN);
        let mut slope = blank.clone();
        let mut significance = blank.clone();
        let mut z_score = blank;

        if width == 0 || height == 0 {
            return Ok(SlopeStage { slope, significance, z_score, summary: RunSummary::default() });
        }

        let chunk = width * self.config.tile_rows;
        let completed = AtomicUsize::new(0);

        #[cfg(feature = "threading")]
        let tiles: Vec<Option<RunSummary>> = slope
            .data
            .par_chunks_mut(chunk)
            .zip(significance.data.par_chunks_mut(chunk))
            .zip(z_score.data.par_chunks_mut(chunk))
            .enumerate()
            .map(|(t, ((s, p), z))| self.process_tile(source, t, s, p, z, cancel, &completed))
            .collect();

        #[cfg(not(feature = "threading"))]
        let tiles: Vec<Option<RunSummary>> = slope
            .data
            .chunks_mut(chunk)
            .zip(significance.data.chunks_mut(chunk))
            .zip(z_score.data.chunks_mut(chunk))
            .enumerate()
            .map(|(t, ((s, p), z))| self.process_tile(source, t, s, p, z, cancel, &completed))
            .collect();

        let mut summary = RunSummary::default();
        for tile in tiles {
            match tile {
                Some(t) => summary = summary.merge(t),
                None => {
                    return Err(TrendError::Cancelled { completed_tiles: completed.load(Ordering::Relaxed) });
                }
            }
        }

        Ok(SlopeStage { slope, significance, z_score, summary })
    }

    /// Process one row band. Returns None if cancelled before starting.
    #[allow(clippy::too_many_arguments)]
    fn process_tile<S: TimeSeriesSource>(
        &self,
        source: &S,
        tile: usize,
        slope: &mut [f32],
        significance: &mut [f32],
        z_score: &mut [f32],
        cancel: &AtomicBool,
        completed: &AtomicUsize,
    ) -> Option<RunSummary> {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }

        let width = source.width();
        let axis = source.axis();
        let first_row = tile * self.config.tile_rows;
        let rows = slope.len() / width;
        let mut ws = Workspace::with_periods(axis.len());
        let mut summary = RunSummary { tiles: 1, ..Default::default() };

        for r in 0..rows {
            for c in 0..width {
                source.read_series(first_row + r, c, &mut ws.values);
                let idx = r * width + c;

                // A source that hands back a series of the wrong length only loses this cell.
                if ws.load(axis).is_err() {
                    summary.record(TestStatus::InsufficientData);
                    continue;
                }

                let trend = self.analyze_in(&mut ws);
                summary.record(trend.test.status);
                if trend.test.status != TestStatus::InsufficientData {
                    significance[idx] = trend.test.p_value as f32;
                    z_score[idx] = trend.test.z as f32;
                }
                if let Some(v) = trend.masked_slope() {
                    slope[idx] = v as f32;
                }
            }
        }

        completed.fetch_add(1, Ordering::Relaxed);
        debug!(tile, first_row, rows, reportable = summary.reportable, "tile done");
        Some(summary)
    }
}
