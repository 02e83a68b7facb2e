//! Equirectangular grid addressing and great-circle distance.
//! Cell math uses f64; stored observation coordinates use f32.

use crate::error::{GeolocError, Result};

/// Earth radius in km used for all distance computations.
pub const EARTH_RADIUS_KM: f64 = 6372.795;

/// A single observation coordinate. Stored 32-bit to halve the model
/// footprint; all arithmetic promotes to f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees, -90 to +90.
    pub lat: f32,
    /// Longitude in degrees, -180 to +180.
    pub lon: f32,
}

impl GeoPoint {
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }
}

/// The world as a rectangular grid of cells. `longranularity` ticks divide
/// 360° of longitude; latitude always gets half as many ticks. Cell 0 is the
/// southwest-most cell; cell indices grow eastward, then northward:
///
/// ```text
///      -------------
///      |...|...|...|
///      -------------
///      | L |L+1|...|
///      -------------
///      | 0 | 1 |L-1|
///      -------------
///      ^ cell 0 = lon -180, lat -90 = (x=0, y=0)
/// ```
///
/// Inputs must satisfy lon ∈ [-180, 180), lat ∈ [-90, 90); no clamping is
/// performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    lon_ticks: usize,
    lat_ticks: usize,
}

impl Grid {
    /// Create a grid from the longitude granularity; anything odd or zero
    /// is rejected.
    pub fn new(longranularity: usize) -> Result<Self> {
        if longranularity == 0 || longranularity % 2 != 0 {
            return Err(GeolocError::InvalidGranularity(longranularity));
        }
        Ok(Self {
            lon_ticks: longranularity,
            lat_ticks: longranularity / 2,
        })
    }

    #[inline]
    pub fn lon_ticks(&self) -> usize {
        self.lon_ticks
    }

    #[inline]
    pub fn lat_ticks(&self) -> usize {
        self.lat_ticks
    }

    /// Total number of cells.
    #[inline]
    pub fn cells(&self) -> usize {
        self.lon_ticks * self.lat_ticks
    }

    /// Angular width/height of one cell in degrees.
    #[inline]
    pub fn delta(&self) -> f64 {
        360.0 / self.lon_ticks as f64
    }

    /// Column containing the given longitude.
    #[inline]
    pub fn x_of_lon(&self, lon: f64) -> usize {
        (self.lon_ticks as f64 / 360.0 * (lon + 180.0)) as usize
    }

    /// Row containing the given latitude. Both axes share the same angular
    /// scale; the row count is just half the column count.
    #[inline]
    pub fn y_of_lat(&self, lat: f64) -> usize {
        (self.lon_ticks as f64 / 360.0 * (lat + 90.0)) as usize
    }

    /// Cell index containing the given coordinates.
    #[inline]
    pub fn cell_of(&self, lat: f64, lon: f64) -> usize {
        self.y_of_lat(lat) * self.lon_ticks + self.x_of_lon(lon)
    }

    #[inline]
    pub fn cell_x(&self, cell: usize) -> usize {
        cell % self.lon_ticks
    }

    #[inline]
    pub fn cell_y(&self, cell: usize) -> usize {
        cell / self.lon_ticks
    }

    /// Longitude of the midpoint of column `x`.
    #[inline]
    pub fn mid_lon(&self, x: usize) -> f64 {
        x as f64 * self.delta() - 180.0 + self.delta() / 2.0
    }

    /// Latitude of the midpoint of row `y`.
    #[inline]
    pub fn mid_lat(&self, y: usize) -> f64 {
        y as f64 * self.delta() - 90.0 + self.delta() / 2.0
    }

    /// Midpoint of a cell as (lat, lon).
    pub fn cell_midpoint(&self, cell: usize) -> (f64, f64) {
        (self.mid_lat(self.cell_y(cell)), self.mid_lon(self.cell_x(cell)))
    }
}

/// Great-circle distance in km between two points given in degrees.
/// Inputs outside the valid ranges produce defined but meaningless results;
/// callers must validate.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin() * (dlat / 2.0).sin()
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin() * (dlon / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}
