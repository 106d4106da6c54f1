use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{TrendError, TrendResult};

/// A 2D grid of scalar values, row-major, with geographic bounds.
/// Missing cells are stored as `NaN` and serialised as JSON `null`.
/// Row 0 lies on the `min_lat` edge; column 0 on the `min_lon` edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    #[serde(serialize_with = "nan_as_null", deserialize_with = "null_as_nan")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

fn nan_as_null<S: Serializer>(data: &[f32], s: S) -> Result<S::Ok, S::Error> {
    let opt: Vec<Option<f32>> = data.iter().map(|&v| v.is_finite().then_some(v)).collect();
    opt.serialize(s)
}

fn null_as_nan<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

/// Geographic box used to restrict global reductions to part of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Domain {
    #[inline]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl Raster {
    /// Create a new Raster filled with the given value.
    pub fn new(width: usize, height: usize, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Create a global-extent Raster with every cell missing.
    pub fn missing(width: usize, height: usize) -> Self {
        Self::new(width, height, -180.0, 180.0, -90.0, 90.0, f32::NAN)
    }

    /// Create a Raster on the same grid and bounds as `self`, every cell missing.
    pub fn missing_like(&self) -> Self {
        Self::new(self.width, self.height, self.min_lon, self.max_lon, self.min_lat, self.max_lat, f32::NAN)
    }

    /// Wrap existing row-major values in a global-extent Raster.
    /// Returns None if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            min_lon: -180.0,
            max_lon: 180.0,
            min_lat: -90.0,
            max_lat: 90.0,
        })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        !self.get(row, col).is_finite()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns LengthMismatch unless `data` holds exactly `width * height` cells.
    /// Deserialised rasters are not checked on load.
    pub fn check_len(&self) -> TrendResult<()> {
        let expected = self.width * self.height;
        if self.data.len() != expected {
            return Err(TrendError::LengthMismatch { expected, actual: self.data.len() });
        }
        Ok(())
    }

    pub fn same_grid(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Geographic coordinates (lon, lat) of a cell on a point grid:
    /// column 0 at `min_lon`, last column at `max_lon`.
    pub fn coords(&self, row: usize, col: usize) -> (f64, f64) {
        let fx = if self.width > 1 { col as f64 / (self.width - 1) as f64 } else { 0.5 };
        let fy = if self.height > 1 { row as f64 / (self.height - 1) as f64 } else { 0.5 };
        (
            self.min_lon + fx * (self.max_lon - self.min_lon),
            self.min_lat + fy * (self.max_lat - self.min_lat),
        )
    }

    /// Number of non-missing cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| v.is_finite())
    }

    /// Smallest non-missing value, or None when every cell is missing.
    pub fn min_value(&self) -> Option<f32> {
        self.valid_values().fold(None, |acc, v| Some(acc.map_or(v, |a: f32| a.min(v))))
    }

    /// Largest non-missing value, or None when every cell is missing.
    pub fn max_value(&self) -> Option<f32> {
        self.valid_values().fold(None, |acc, v| Some(acc.map_or(v, |a: f32| a.max(v))))
    }
}
