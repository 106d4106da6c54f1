//! Gridded time-series stack: one value per location per period.
//!
//! Values are stored location-major (`[(row * width + col) * n + k]`) so the
//! series of a single location is one contiguous slice.
use crate::error::{TrendError, TrendResult};
use crate::raster::Raster;
use crate::series::TimeAxis;

/// Supplier of per-location series on a rectangular time axis.
///
/// Implementations must be safe to read from many worker threads at once.
pub trait TimeSeriesSource: Sync {
    fn axis(&self) -> &TimeAxis;
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Copy the values of location (row, col) into `out` (length `axis().len()`).
    /// Missing values are written as `NaN`.
    fn read_series(&self, row: usize, col: usize, out: &mut [f32]);

    /// Geographic bounds `(min_lon, max_lon, min_lat, max_lat)` of the grid.
    fn bounds(&self) -> (f64, f64, f64, f64) {
        (-180.0, 180.0, -90.0, 90.0)
    }
}

/// In-memory stack of per-period rasters sharing one grid and one time axis.
#[derive(Debug, Clone)]
pub struct SeriesStack {
    pub axis: TimeAxis,
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    values: Vec<f32>,
}

impl SeriesStack {
    /// Interleave one raster per period into a location-major stack.
    /// Every band must share the grid of the first one; bounds are taken from it.
    pub fn from_bands(axis: TimeAxis, bands: &[Raster]) -> TrendResult<Self> {
        if bands.len() != axis.len() {
            return Err(TrendError::LengthMismatch { expected: axis.len(), actual: bands.len() });
        }
        for band in bands {
            band.check_len()?;
        }
        let first = &bands[0];
        if let Some(bad) = bands.iter().find(|b| !b.same_grid(first)) {
            return Err(TrendError::ShapeMismatch {
                expected_width: first.width,
                expected_height: first.height,
                width: bad.width,
                height: bad.height,
            });
        }

        let n = axis.len();
        let cells = first.width * first.height;
        let mut values = vec![f32::NAN; cells * n];
        for (k, band) in bands.iter().enumerate() {
            for (cell, &v) in band.data.iter().enumerate() {
                values[cell * n + k] = v;
            }
        }

        Ok(Self {
            axis,
            width: first.width,
            height: first.height,
            min_lon: first.min_lon,
            max_lon: first.max_lon,
            min_lat: first.min_lat,
            max_lat: first.max_lat,
            values,
        })
    }

    pub fn periods(&self) -> usize {
        self.axis.len()
    }

    /// Contiguous series of location (row, col).
    #[inline]
    pub fn series_values(&self, row: usize, col: usize) -> &[f32] {
        let n = self.axis.len();
        let start = (row * self.width + col) * n;
        &self.values[start..start + n]
    }

    /// Extract period `k` as a raster.
    pub fn band(&self, k: usize) -> Raster {
        let n = self.axis.len();
        let mut out = Raster::new(self.width, self.height, self.min_lon, self.max_lon, self.min_lat, self.max_lat, f32::NAN);
        for (cell, v) in out.data.iter_mut().enumerate() {
            *v = self.values[cell * n + k];
        }
        out
    }
}

impl TimeSeriesSource for SeriesStack {
    fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_series(&self, row: usize, col: usize, out: &mut [f32]) {
        out.copy_from_slice(self.series_values(row, col));
    }

    fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.min_lon, self.max_lon, self.min_lat, self.max_lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(values: [f32; 4]) -> Raster {
        Raster::from_vec(2, 2, values.to_vec()).unwrap()
    }

    #[test]
    fn bands_are_interleaved_per_location() {
        let axis = TimeAxis::new(vec![0, 1, 2]).unwrap();
        let bands = [band([1.0, 2.0, 3.0, 4.0]), band([5.0, 6.0, 7.0, 8.0]), band([9.0, 10.0, 11.0, 12.0])];
        let stack = SeriesStack::from_bands(axis, &bands).unwrap();

        assert_eq!(stack.series_values(0, 0), &[1.0, 5.0, 9.0]);
        assert_eq!(stack.series_values(1, 1), &[4.0, 8.0, 12.0]);

        let mut buf = [0.0f32; 3];
        stack.read_series(0, 1, &mut buf);
        assert_eq!(buf, [2.0, 6.0, 10.0]);

        assert_eq!(stack.band(1).data, bands[1].data);
    }

    #[test]
    fn mismatched_band_shape_is_rejected() {
        let axis = TimeAxis::new(vec![0, 1]).unwrap();
        let bands = [band([0.0; 4]), Raster::missing(3, 1)];
        let err = SeriesStack::from_bands(axis, &bands).unwrap_err();
        assert!(matches!(err, TrendError::ShapeMismatch { width: 3, height: 1, .. }));
    }

    #[test]
    fn band_count_must_match_axis() {
        let axis = TimeAxis::new(vec![0, 1]).unwrap();
        let err = SeriesStack::from_bands(axis, &[band([0.0; 4])]).unwrap_err();
        assert!(matches!(err, TrendError::LengthMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn band_with_wrong_cell_count_is_rejected() {
        let axis = TimeAxis::new(vec![0, 1]).unwrap();
        let mut oversized = Raster::missing(2, 1);
        oversized.data.push(1.0);
        let bands = [Raster::missing(2, 1), oversized];
        let err = SeriesStack::from_bands(axis.clone(), &bands).unwrap_err();
        assert!(matches!(err, TrendError::LengthMismatch { expected: 2, actual: 3 }));

        let json = r#"{ "data": [1.0], "width": 2, "height": 1,
                        "min_lon": 0.0, "max_lon": 1.0, "min_lat": 0.0, "max_lat": 1.0 }"#;
        let undersized: Raster = serde_json::from_str(json).unwrap();
        let err = SeriesStack::from_bands(axis, &[undersized, Raster::missing(2, 1)]).unwrap_err();
        assert!(matches!(err, TrendError::LengthMismatch { expected: 2, actual: 1 }));
    }
}
