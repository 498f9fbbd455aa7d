pub mod line;
pub mod polygon;

use crate::error::GeoResult;
use crate::geo::{Coordinate, unwrap_longitude, wrap_longitude};

pub use line::{Intersection, Line, segments_cross};
pub use polygon::{area_acres, order};

/// A coordinate viewed as a point on the plane: x = longitude, y = latitude.
///
/// Longitude is unwrapped about a reference meridian, so every point taking
/// part in one computation must use the same meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanePoint {
    pub x: f64,
    pub y: f64,
}

impl PlanePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn about(coord: Coordinate, meridian: f64) -> Self {
        Self::new(
            unwrap_longitude(coord.longitude(), meridian),
            coord.latitude(),
        )
    }

    /// Wraps x back into [-180, 180]; fails for latitudes off the globe.
    pub fn to_coordinate(self) -> GeoResult<Coordinate> {
        Coordinate::new(self.y, wrap_longitude(self.x))
    }
}
