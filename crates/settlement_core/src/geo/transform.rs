//! Linear projection between geographic coordinates and the planar grid.
//!
//! # Invariants
//! - Points inside the bounding box land inside `[0, grid_size]` on both axes.
//! - `from_grid(to_grid(p)) == p` within floating point tolerance.

use serde::{Deserialize, Serialize};

/// Side length of the simulation grid.
pub const SIMULATION_GRID_SIZE: f64 = 100_000.0;
/// Side length of the coastline sampling grid.
pub const COASTLINE_GRID_SIZE: f64 = 50_000.0;

/// Axis-aligned geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Approximate extent of the island of Ireland (Mizen, Malin, Dunmore, Wicklow).
pub const IRELAND_BBOX: BoundingBox = BoundingBox {
    min_lat: 51.4,
    max_lat: 55.4,
    min_lon: -10.6,
    max_lon: -5.9,
};

impl BoundingBox {
    pub fn lat_range(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_range(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

/// Grid projection parameters, serialized as `{"origin": [lon, lat], "scale": [sx, sy]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// `(min_lon, min_lat)` of the source box.
    pub origin: (f64, f64),
    /// Grid units per degree along `(lon, lat)`.
    pub scale: (f64, f64),
}

impl GridTransform {
    /// Builds the transform mapping `bbox` onto a `grid_size` square.
    pub fn for_bbox(bbox: &BoundingBox, grid_size: f64) -> Self {
        Self {
            origin: (bbox.min_lon, bbox.min_lat),
            scale: (grid_size / bbox.lon_range(), grid_size / bbox.lat_range()),
        }
    }

    /// Transform used for the simulation output grid.
    pub fn simulation() -> Self {
        Self::for_bbox(&IRELAND_BBOX, SIMULATION_GRID_SIZE)
    }

    /// Transform used to size the coastline sampling grid.
    pub fn coastline() -> Self {
        Self::for_bbox(&IRELAND_BBOX, COASTLINE_GRID_SIZE)
    }

    /// Projects `(lat, lon)` to `(x, y)`.
    pub fn to_grid(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            (lon - self.origin.0) * self.scale.0,
            (lat - self.origin.1) * self.scale.1,
        )
    }

    /// Inverse of [`GridTransform::to_grid`], returning `(lat, lon)`.
    pub fn from_grid(&self, x: f64, y: f64) -> (f64, f64) {
        (
            y / self.scale.1 + self.origin.1,
            x / self.scale.0 + self.origin.0,
        )
    }

    /// Degrees spanned by one grid unit along `(lon, lat)`.
    pub fn degrees_per_unit(&self) -> (f64, f64) {
        (1.0 / self.scale.0, 1.0 / self.scale.1)
    }
}
