//! Pixel-wise robust trend analysis for gridded annual indicators.
//!
//! For every grid cell the Mann–Kendall test decides whether a monotonic
//! trend is significant; Sen's slope measures it; a global percentile pass
//! rescales the masked slopes into [-1, 1].
//!
//! The `threading` feature runs tiles on the rayon pool; its tests run with
//! `cargo test -p trend-core --features threading`.
pub mod composite;
pub mod engine;
pub mod error;
pub mod mann_kendall;
pub mod params;
pub mod raster;
pub mod rescale;
pub mod sen;
pub mod series;
pub mod stack;
pub mod workspace;

pub use engine::{LocationTrend, RunSummary, SlopeStage, TrendEngine, TrendOutput};
pub use error::{ConfigError, TrendError, TrendResult};
pub use params::TrendConfig;
pub use raster::{Domain, Raster};
pub use rescale::{PercentileAnchors, PercentileRescaler};
pub use series::{Sample, Series, TimeAxis, SECONDS_PER_YEAR};
pub use stack::{SeriesStack, TimeSeriesSource};
