use thiserror::Error;

use crate::lob::SensorId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("Projection distance {0} m is below the 5 m minimum")]
    ProjectionTooShort(f64),
    #[error("Bearing {0} is outside [0, 360]")]
    InvalidBearing(f64),
    #[error("Bearing is undefined between identical points")]
    DegenerateBearing,
    #[error("Cannot take the centroid of an empty coordinate set")]
    EmptyCoordinateSet,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Latitude {0} is outside the UTM band range [-80, 84]")]
    OutOfRange(f64),
    #[error("Easting {0} m lies outside the zone's eight 100 km columns")]
    EastingOutOfRange(f64),
    #[error("Malformed grid reference {0:?}: {1}")]
    Malformed(String, &'static str),
    #[error(transparent)]
    Geo(#[from] GeoError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FixError {
    #[error("No sensor reports supplied")]
    NoSensors,
    #[error(
        "Centerlines of {first} and {second} cross but their determinant {determinant:e} is too small to solve"
    )]
    NumericalInstability {
        first: SensorId,
        second: SensorId,
        determinant: f64,
    },
    #[error(transparent)]
    Geo(#[from] GeoError),
}

pub type GeoResult<T> = std::result::Result<T, GeoError>;
pub type GridResult<T> = std::result::Result<T, GridError>;
pub type FixResult<T> = std::result::Result<T, FixError>;
