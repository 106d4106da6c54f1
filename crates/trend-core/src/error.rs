//! Error types for configuration and batch-level failures.
//!
//! Per-location numeric conditions (too few samples, zero variance) are not
//! errors; they are recorded as [`crate::mann_kendall::TestStatus`] values and
//! surface as missing cells in the output rasters.
use thiserror::Error;

/// Invalid engine configuration. Raised before any computation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("significance threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("percentile anchors must satisfy 0 <= low < high <= 100, got low = {low}, high = {high}")]
    InvalidPercentiles { low: f64, high: f64 },

    #[error("time unit conversion must be finite and positive, got {0}")]
    InvalidTimeConversion(f64),

    #[error("spatial sampling resolution must be at least 1")]
    InvalidSamplingResolution,

    #[error("max percentile samples must be at least 2, got {0}")]
    InvalidSampleBound(usize),

    #[error("tile_rows must be at least 1")]
    InvalidTileRows,

    #[error("rescale domain is empty or inverted: lon [{min_lon}, {max_lon}], lat [{min_lat}, {max_lat}]")]
    InvalidDomain {
        min_lon: f64,
        max_lon: f64,
        min_lat: f64,
        max_lat: f64,
    },

    #[error("could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a whole engine run or of input assembly.
#[derive(Debug, Error)]
pub enum TrendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("grid shape mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("time axis has no periods")]
    EmptyTimeAxis,

    #[error("time axis must be strictly increasing (index {index})")]
    NonIncreasingTimeAxis { index: usize },

    #[error("run cancelled after {completed_tiles} completed tiles")]
    Cancelled { completed_tiles: usize },
}

pub type TrendResult<T> = Result<T, TrendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_embed_payload() {
        let e = ConfigError::InvalidPercentiles { low: 98.0, high: 2.0 };
        let msg = e.to_string();
        assert!(msg.contains("98") && msg.contains("2"), "{msg}");

        let e = ConfigError::InvalidThreshold(1.5);
        assert!(e.to_string().contains("1.5"));
    }

    #[test]
    fn config_error_converts_into_trend_error() {
        let e: TrendError = ConfigError::InvalidTileRows.into();
        assert!(matches!(e, TrendError::Config(ConfigError::InvalidTileRows)));
        assert_eq!(e.to_string(), "tile_rows must be at least 1");
    }
}
