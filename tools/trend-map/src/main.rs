/// Run the trend engine over a JSON time-series stack and write the
/// rescaled, masked slope map plus the per-location diagnostics as JSON.
///
/// Input is either a stack (`--input`) or a yearly indicator record
/// (`--indicators`) that is first composited into annual quality layers.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trend_core::composite::{compute_layers, IndicatorRecord};
use trend_core::{PercentileAnchors, Raster, RunSummary, SeriesStack, TimeAxis, TrendConfig, TrendEngine};

#[derive(Parser, Debug)]
#[command(name = "trend-map", about = "Pixel-wise Mann-Kendall / Sen's slope trend map")]
struct Args {
    /// Stack JSON: `{ "timestamps": [...], "bands": [Raster, ...] }`.
    #[arg(short, long, conflicts_with = "indicators", required_unless_present = "indicators")]
    input: Option<PathBuf>,

    /// Indicator record JSON (LAI, NDVI, GPP and land-cover fractions per year).
    #[arg(long)]
    indicators: Option<PathBuf>,

    /// TrendConfig JSON; missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON path.
    #[arg(short, long, default_value = "trend.json")]
    output: PathBuf,

    /// Clamp rescaled values into [-1, 1] (overrides the config).
    #[arg(long)]
    clamp: bool,
}

#[derive(Deserialize)]
struct StackFile {
    timestamps: TimeAxis,
    bands: Vec<Raster>,
}

#[derive(Serialize)]
struct OutputFile<'a> {
    rescaled: &'a Raster,
    slope: &'a Raster,
    significance: &'a Raster,
    z_score: &'a Raster,
    anchors: Option<PercentileAnchors>,
    summary: RunSummary,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_stack(args: &Args, config: &TrendConfig) -> Result<SeriesStack> {
    if let Some(path) = &args.indicators {
        let record: IndicatorRecord = read_json(path)?;
        let layers = compute_layers(&record).context("building quality layers")?;
        info!(years = layers.eqi.len(), first_year = layers.first_year, "composited indicator record");
        return Ok(layers.quality_stack(config.time_unit_conversion)?);
    }

    let path = args.input.as_ref().context("either --input or --indicators is required")?;
    let file: StackFile = read_json(path)?;
    Ok(SeriesStack::from_bands(file.timestamps, &file.bands)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            TrendConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => TrendConfig::default(),
    };
    if args.clamp {
        config.clamp_rescaled = true;
    }

    let engine = TrendEngine::new(config)?;
    let stack = load_stack(&args, engine.config())?;
    info!(width = stack.width, height = stack.height, periods = stack.periods(), "loaded stack");

    let out = engine.run(&stack)?;

    let file = OutputFile {
        rescaled: &out.rescaled,
        slope: &out.slope,
        significance: &out.significance,
        z_score: &out.z_score,
        anchors: out.anchors,
        summary: out.summary,
    };
    let json = serde_json::to_string(&file)?;
    fs::write(&args.output, json).with_context(|| format!("writing {}", args.output.display()))?;
    info!(path = %args.output.display(), "wrote trend map");

    Ok(())
}
