pub mod grid;

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, GeoResult};

/// Mean Earth radius used for every spherical computation in the engine.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Below this the destination-point adjustment is meaningless.
pub const MIN_PROJECTION_DISTANCE_M: f64 = 5.0;

/// WGS84 latitude/longitude in decimal degrees.
///
/// Fields are private so that every value in circulation is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoError;

    fn try_from(raw: RawCoordinate) -> GeoResult<Self> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> GeoResult<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(GeoError::InvalidCoordinate {
                lat: latitude,
                lon: longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Wrap any angle into [0, 360).
pub fn normalize_bearing(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Bring any longitude back into [-180, 180].
pub fn wrap_longitude(degrees: f64) -> f64 {
    if (-180.0..=180.0).contains(&degrees) {
        degrees
    } else {
        (degrees + 540.0).rem_euclid(360.0) - 180.0
    }
}

/// `degrees` on the branch within half a turn of `meridian`, so points either
/// side of the antimeridian stay adjacent. The result may leave [-180, 180].
pub fn unwrap_longitude(degrees: f64, meridian: f64) -> f64 {
    meridian + (degrees - meridian + 180.0).rem_euclid(360.0) - 180.0
}

/// Destination point `distance_m` metres from `origin` along `bearing_deg`.
///
/// Spherical-earth formula; adequate for the tens-of-kilometres envelope the
/// sensors operate in.
pub fn project(origin: Coordinate, bearing_deg: f64, distance_m: f64) -> GeoResult<Coordinate> {
    if !(distance_m >= MIN_PROJECTION_DISTANCE_M) {
        return Err(GeoError::ProjectionTooShort(distance_m));
    }
    if !(0.0..=360.0).contains(&bearing_deg) {
        return Err(GeoError::InvalidBearing(bearing_deg));
    }

    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_m / EARTH_RADIUS;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Coordinate::new(
        lat2.to_degrees().clamp(-90.0, 90.0),
        wrap_longitude(lon2.to_degrees()),
    )
}

/// Great-circle (haversine) distance in metres.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS * c
}

/// Initial great-circle bearing from `origin` to `target`, in [0, 360).
pub fn bearing(origin: Coordinate, target: Coordinate) -> GeoResult<f64> {
    if origin == target {
        return Err(GeoError::DegenerateBearing);
    }
    let lat1 = origin.latitude.to_radians();
    let lat2 = target.latitude.to_radians();
    let dlon = (target.longitude - origin.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    Ok(normalize_bearing(y.atan2(x).to_degrees()))
}

/// Component-wise mean. Not a spherical centroid; fine below ~100 km extents.
///
/// Longitudes are averaged about the first point's meridian.
pub fn centroid(coords: &[Coordinate]) -> GeoResult<Coordinate> {
    let Some(first) = coords.first() else {
        return Err(GeoError::EmptyCoordinateSet);
    };
    let meridian = first.longitude;
    let n = coords.len() as f64;
    let (lat_sum, lon_sum) = coords.iter().fold((0.0, 0.0), |(lat, lon), c| {
        (lat + c.latitude, lon + unwrap_longitude(c.longitude, meridian))
    });
    Coordinate::new(lat_sum / n, wrap_longitude(lon_sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_coordinate_range_is_enforced() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(GeoError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::new(0.0, -180.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_deserialize_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude": 10.0, "longitude": 20.0}"#).unwrap();
        assert_eq!(ok, coord(10.0, 20.0));

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude": 100.0, "longitude": 20.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_distance_symmetry() {
        let a = coord(45.0, 5.0);
        let b = coord(45.1, 5.2);
        let ab = distance(a, b);
        assert!(ab > 0.0);
        assert!((ab - distance(b, a)).abs() < 1e-9);
        assert_eq!(distance(a, a), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance(coord(0.0, 0.0), coord(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_projection_inverts_bearing() {
        let origin = coord(34.5, -117.2);
        for b in [0.0, 45.0, 90.0, 135.0, 200.0, 359.0] {
            for d in [5.0, 250.0, 12_000.0] {
                let p = project(origin, b, d).unwrap();
                let back = bearing(origin, p).unwrap();
                let diff = (back - b + 540.0).rem_euclid(360.0) - 180.0;
                assert!(diff.abs() < 1e-6, "bearing {b} distance {d}: got {back}");
                assert!((distance(origin, p) - d).abs() < 1e-6 * d.max(1.0));
            }
        }
    }

    #[test]
    fn test_projection_rejects_bad_input() {
        let origin = coord(0.0, 0.0);
        assert_eq!(project(origin, 90.0, 4.9), Err(GeoError::ProjectionTooShort(4.9)));
        assert_eq!(project(origin, 360.5, 100.0), Err(GeoError::InvalidBearing(360.5)));
        assert!(project(origin, -1.0, 100.0).is_err());
        assert!(project(origin, 360.0, 100.0).is_ok());
    }

    #[test]
    fn test_projection_wraps_antimeridian() {
        let p = project(coord(0.0, 179.999), 90.0, 1_000.0).unwrap();
        assert!(p.longitude() < -179.99);
    }

    #[test]
    fn test_bearing_degenerate() {
        let a = coord(12.0, 34.0);
        assert_eq!(bearing(a, a), Err(GeoError::DegenerateBearing));
    }

    #[test]
    fn test_bearing_due_west_is_270() {
        let b = bearing(coord(0.0, 0.0), coord(0.0, -0.5)).unwrap();
        assert!((b - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&[coord(0.0, 0.0), coord(2.0, 4.0), coord(1.0, 2.0)]).unwrap();
        assert!((c.latitude() - 1.0).abs() < 1e-12);
        assert!((c.longitude() - 2.0).abs() < 1e-12);
        assert_eq!(centroid(&[]), Err(GeoError::EmptyCoordinateSet));
    }

    #[test]
    fn test_unwrap_longitude_stays_near_meridian() {
        assert!((unwrap_longitude(-179.9, 179.9) - 180.1).abs() < 1e-9);
        assert!((unwrap_longitude(179.9, -179.9) + 180.1).abs() < 1e-9);
        assert_eq!(unwrap_longitude(10.0, 5.0), 10.0);
        assert!((wrap_longitude(180.1) + 179.9).abs() < 1e-9);
    }

    #[test]
    fn test_centroid_across_antimeridian() {
        let west = coord(-17.0, 179.99);
        let east = coord(-17.0, -179.97);
        let c = centroid(&[west, east]).unwrap();
        assert!((c.longitude() + 179.99).abs() < 1e-9, "got {c}");
        assert!((distance(c, west) - distance(c, east)).abs() < 1e-6);
        assert!(distance(c, west) < 5_000.0);
    }

    #[test]
    fn test_normalize_bearing() {
        assert_eq!(normalize_bearing(-5.0), 355.0);
        assert_eq!(normalize_bearing(365.0), 5.0);
        assert_eq!(normalize_bearing(360.0), 0.0);
        assert!(normalize_bearing(-1e-18) < 360.0);
    }
}
