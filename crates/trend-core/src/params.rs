use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mann_kendall::DEFAULT_SIGNIFICANCE;
use crate::raster::Domain;
use crate::series::SECONDS_PER_YEAR;

/// Engine configuration. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Maximum p-value for a trend to be reported (0-1], default 0.005.
    pub significance_threshold: f64,
    /// Lower rescaling anchor percentile, default 2.
    pub percentile_low: f64,
    /// Upper rescaling anchor percentile, default 98.
    pub percentile_high: f64,
    /// Timestamp units per year, default 86 400 × 365 (seconds).
    pub time_unit_conversion: f64,
    /// Row/column stride of the percentile pass. 1 = every cell.
    pub spatial_sampling_resolution: usize,
    /// Upper bound on values held by the percentile pass.
    pub max_percentile_samples: usize,
    /// Seed for reservoir down-sampling in the percentile pass.
    pub sampling_seed: u64,
    /// Clamp rescaled slopes into [-1, 1]. Off by default.
    pub clamp_rescaled: bool,
    /// Restrict the percentile pass to this box; None = whole grid.
    pub rescale_domain: Option<Domain>,
    /// Rows per work tile.
    pub tile_rows: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            significance_threshold: DEFAULT_SIGNIFICANCE,
            percentile_low: 2.0,
            percentile_high: 98.0,
            time_unit_conversion: SECONDS_PER_YEAR,
            spatial_sampling_resolution: 1,
            max_percentile_samples: 1_000_000,
            sampling_seed: 0x5EED_2002,
            clamp_rescaled: false,
            rescale_domain: None,
            tile_rows: 64,
        }
    }
}

impl TrendConfig {
    /// Parse JSON and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.significance_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::InvalidThreshold(t));
        }

        let (low, high) = (self.percentile_low, self.percentile_high);
        if !(low >= 0.0 && high <= 100.0 && low < high) {
            return Err(ConfigError::InvalidPercentiles { low, high });
        }

        let k = self.time_unit_conversion;
        if !(k.is_finite() && k > 0.0) {
            return Err(ConfigError::InvalidTimeConversion(k));
        }

        if self.spatial_sampling_resolution == 0 {
            return Err(ConfigError::InvalidSamplingResolution);
        }
        if self.max_percentile_samples < 2 {
            return Err(ConfigError::InvalidSampleBound(self.max_percentile_samples));
        }
        if self.tile_rows == 0 {
            return Err(ConfigError::InvalidTileRows);
        }

        if let Some(d) = self.rescale_domain {
            if !(d.min_lon <= d.max_lon && d.min_lat <= d.max_lat) {
                return Err(ConfigError::InvalidDomain {
                    min_lon: d.min_lon,
                    max_lon: d.max_lon,
                    min_lat: d.min_lat,
                    max_lat: d.max_lat,
                });
            }
        }

        Ok(())
    }
}
