//! MGRS-style grid references.
//!
//! A reference is `ZZ` (zero-padded UTM zone), `B` (latitude band), `XY`
//! (100 km square column/row letters) followed by equal-length easting and
//! northing digit groups. At 1 m precision the result is the 15 character
//! `ZZBXYEEEEENNNNN`.
//!
//! Encoding truncates to the cell, decoding returns the cell centre, so a
//! round trip lands within half a cell on each axis. Polar (UPS) regions are
//! not covered.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::geo::Coordinate;

// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

const BAND_LETTERS: &[u8; 20] = b"CDEFGHJKLMNPQRSTUVWX";
const COLUMN_LETTERS: &[u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const ROW_LETTERS: &[u8; 20] = b"ABCDEFGHJKLMNPQRSTUV";

const MIN_LATITUDE: f64 = -80.0;
const MAX_LATITUDE: f64 = 84.0;
const SQUARE_M: f64 = 100_000.0;
const ROW_CYCLE_M: f64 = 2_000_000.0;
const BAND_EDGE_MARGIN_M: f64 = 50_000.0;

/// Digits per axis after the 5 character prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GridPrecision {
    #[serde(rename = "1km")]
    Km1,
    #[serde(rename = "100m")]
    M100,
    #[serde(rename = "10m")]
    M10,
    #[default]
    #[serde(rename = "1m")]
    M1,
}

impl GridPrecision {
    pub fn digits(self) -> usize {
        match self {
            GridPrecision::Km1 => 2,
            GridPrecision::M100 => 3,
            GridPrecision::M10 => 4,
            GridPrecision::M1 => 5,
        }
    }

    pub fn cell_size_m(self) -> f64 {
        10f64.powi(5 - self.digits() as i32)
    }

    fn from_digits(digits: usize) -> Option<Self> {
        match digits {
            2 => Some(GridPrecision::Km1),
            3 => Some(GridPrecision::M100),
            4 => Some(GridPrecision::M10),
            5 => Some(GridPrecision::M1),
            _ => None,
        }
    }
}

impl FromStr for GridPrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1km" => Ok(GridPrecision::Km1),
            "100m" => Ok(GridPrecision::M100),
            "10m" => Ok(GridPrecision::M10),
            "1m" => Ok(GridPrecision::M1),
            other => Err(format!("unknown grid precision {other:?} (expected 1km, 100m, 10m or 1m)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridReference {
    text: String,
    precision: GridPrecision,
}

impl GridReference {
    pub fn encode(coord: Coordinate, precision: GridPrecision) -> GridResult<Self> {
        let lat = coord.latitude();
        if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&lat) {
            return Err(GridError::OutOfRange(lat));
        }
        let zone = zone_for(lat, coord.longitude());
        let band = band_letter(lat);
        let utm = to_utm(coord, zone);

        let set = zone_set(zone);
        let column = column_letter(set, utm.easting)?;

        let row = ((utm.northing / SQUARE_M).floor() as usize) % ROW_LETTERS.len();
        let row_letter = ROW_LETTERS[(row + row_offset(set)) % ROW_LETTERS.len()] as char;

        let cell = precision.cell_size_m();
        let easting = (utm.easting.rem_euclid(SQUARE_M) / cell).floor() as u64;
        let northing = (utm.northing.rem_euclid(SQUARE_M) / cell).floor() as u64;
        let digits = precision.digits();

        let text = format!(
            "{zone:02}{band}{column}{row_letter}{easting:0digits$}{northing:0digits$}"
        );
        Ok(Self { text, precision })
    }

    /// Centre of the referenced cell.
    pub fn decode(text: &str) -> GridResult<Coordinate> {
        Self::parse(text)?.to_coordinate()
    }

    fn parse(text: &str) -> GridResult<Self> {
        let malformed = |why| GridError::Malformed(text.to_string(), why);
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if !cleaned.is_ascii() || cleaned.len() < 5 {
            return Err(malformed("too short"));
        }

        // tolerate a single-digit zone on input
        let zone_len = if cleaned.as_bytes()[1].is_ascii_digit() { 2 } else { 1 };
        let zone: u8 = cleaned[..zone_len]
            .parse()
            .map_err(|_| malformed("zone is not numeric"))?;
        if !(1..=60).contains(&zone) {
            return Err(malformed("zone outside 1..=60"));
        }

        let rest = &cleaned[zone_len..];
        if rest.len() < 3 {
            return Err(malformed("missing band or square letters"));
        }
        let letters = &rest.as_bytes()[..3];
        if !BAND_LETTERS.contains(&letters[0]) {
            return Err(malformed("unknown latitude band"));
        }
        if !COLUMN_LETTERS.contains(&letters[1]) || !ROW_LETTERS.contains(&letters[2]) {
            return Err(malformed("unknown 100 km square letters"));
        }

        let numeric = &rest[3..];
        if !numeric.bytes().all(|b| b.is_ascii_digit()) || numeric.len() % 2 != 0 {
            return Err(malformed("easting/northing digits must be an even-length number"));
        }
        let precision =
            GridPrecision::from_digits(numeric.len() / 2).ok_or(malformed("unsupported precision"))?;

        Ok(Self {
            text: format!("{zone:02}{}", &rest),
            precision,
        })
    }

    fn to_coordinate(&self) -> GridResult<Coordinate> {
        let bytes = self.text.as_bytes();
        let zone: u8 = self.text[..2]
            .parse()
            .map_err(|_| GridError::Malformed(self.text.clone(), "zone is not numeric"))?;
        let band = bytes[2];
        let set = zone_set(zone);

        let column_pos = position(COLUMN_LETTERS, bytes[3]);
        let group_start = ((set - 1) % 3) * 8;
        if column_pos < group_start || column_pos >= group_start + 8 {
            return Err(GridError::Malformed(
                self.text.clone(),
                "column letter does not belong to this zone",
            ));
        }
        let column = (column_pos - group_start + 1) as f64;

        let rows = ROW_LETTERS.len();
        let row = (position(ROW_LETTERS, bytes[4]) + rows - row_offset(set)) % rows;

        let digits = self.precision.digits();
        let cell = self.precision.cell_size_m();
        let numeric = &self.text[5..];
        let parse_group = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| GridError::Malformed(self.text.clone(), "digits are not numeric"))
        };
        let easting_digits = parse_group(&numeric[..digits])? as f64;
        let northing_digits = parse_group(&numeric[digits..])? as f64;

        let easting = column * SQUARE_M + easting_digits * cell + cell / 2.0;

        let band_index = position(BAND_LETTERS, band);
        let band_south = MIN_LATITUDE + 8.0 * band_index as f64;
        let southern = band_south < 0.0;
        let central = central_meridian(zone);
        // southern parallels sag below the band edge away from the central meridian
        let band_floor = to_utm(Coordinate::new(band_south, central)?, zone).northing;
        let band_floor = ((band_floor - BAND_EDGE_MARGIN_M) / SQUARE_M).floor() * SQUARE_M;

        let mut northing = row as f64 * SQUARE_M;
        while northing < band_floor {
            northing += ROW_CYCLE_M;
        }
        northing += northing_digits * cell + cell / 2.0;

        from_utm(Utm { easting, northing }, zone, southern)
    }

    pub fn precision(&self) -> GridPrecision {
        self.precision
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for GridReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for GridReference {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        let parsed = Self::parse(s)?;
        // reject letter combinations that do not exist in the zone
        parsed.to_coordinate()?;
        Ok(parsed)
    }
}

impl TryFrom<String> for GridReference {
    type Error = GridError;

    fn try_from(value: String) -> GridResult<Self> {
        value.parse()
    }
}

impl From<GridReference> for String {
    fn from(value: GridReference) -> Self {
        value.text
    }
}

#[derive(Debug, Clone, Copy)]
struct Utm {
    easting: f64,
    northing: f64,
}

fn position(alphabet: &[u8], letter: u8) -> usize {
    alphabet.iter().position(|&l| l == letter).unwrap_or(0)
}

fn zone_set(zone: u8) -> usize {
    match zone as usize % 6 {
        0 => 6,
        n => n,
    }
}

/// 100 km column letter; a zone spans columns 1..=8 of its set's group.
fn column_letter(set: usize, easting: f64) -> GridResult<char> {
    let column = (easting / SQUARE_M).floor();
    if !(1.0..=8.0).contains(&column) {
        return Err(GridError::EastingOutOfRange(easting));
    }
    Ok(COLUMN_LETTERS[((set - 1) % 3) * 8 + column as usize - 1] as char)
}

fn row_offset(set: usize) -> usize {
    if set % 2 == 0 { 5 } else { 0 }
}

fn zone_for(lat: f64, lon: f64) -> u8 {
    // Norway and Svalbard exceptions
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..=84.0).contains(&lat) && (0.0..42.0).contains(&lon) {
        return match lon {
            l if l < 9.0 => 31,
            l if l < 21.0 => 33,
            l if l < 33.0 => 35,
            _ => 37,
        };
    }
    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60) as u8
}

fn band_letter(lat: f64) -> char {
    let index = ((lat - MIN_LATITUDE) / 8.0).floor() as usize;
    BAND_LETTERS[index.min(BAND_LETTERS.len() - 1)] as char
}

fn central_meridian(zone: u8) -> f64 {
    zone as f64 * 6.0 - 183.0
}

fn ellipsoid() -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    (e2, e2 / (1.0 - e2))
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Transverse Mercator forward projection (Snyder series) into `zone`.
fn to_utm(coord: Coordinate, zone: u8) -> Utm {
    let (e2, ep2) = ellipsoid();
    let phi = coord.latitude().to_radians();
    let mut dlon = coord.longitude() - central_meridian(zone);
    if dlon > 180.0 {
        dlon -= 360.0;
    } else if dlon < -180.0 {
        dlon += 360.0;
    }
    let dlon = dlon.to_radians();

    let n = WGS84_A / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * phi.cos().powi(2);
    let a = phi.cos() * dlon;
    let m = meridian_arc(phi, e2);

    let easting = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;
    let mut northing = UTM_K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if coord.latitude() < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
    }

    Utm { easting, northing }
}

fn from_utm(utm: Utm, zone: u8, southern: bool) -> GridResult<Coordinate> {
    let (e2, ep2) = ellipsoid();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let x = utm.easting - FALSE_EASTING;
    let y = if southern {
        utm.northing - FALSE_NORTHING_SOUTH
    } else {
        utm.northing
    };

    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let c1 = ep2 * phi1.cos().powi(2);
    let t1 = phi1.tan().powi(2);
    let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / phi1.cos();

    let lat = phi.to_degrees().clamp(-90.0, 90.0);
    let lon = central_meridian(zone) + lambda * 180.0 / PI;
    let lon = if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    };
    Ok(Coordinate::new(lat, lon)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_encode_on_central_meridian_at_equator() {
        let grid = GridReference::encode(coord(0.0, 3.0), GridPrecision::M1).unwrap();
        assert_eq!(grid.as_str(), "31NEA0000000000");
        assert_eq!(grid.as_str().len(), 15);
    }

    #[test]
    fn test_encode_null_island() {
        let grid = GridReference::encode(coord(0.0, 0.0), GridPrecision::M1).unwrap();
        assert_eq!(grid.as_str(), "31NAA6602100000");
    }

    #[test]
    fn test_precision_controls_length() {
        let c = coord(45.5, 5.25);
        for (precision, len) in [
            (GridPrecision::Km1, 9),
            (GridPrecision::M100, 11),
            (GridPrecision::M10, 13),
            (GridPrecision::M1, 15),
        ] {
            let grid = GridReference::encode(c, precision).unwrap();
            assert_eq!(grid.as_str().len(), len, "{grid}");
            assert_eq!(grid.precision(), precision);
        }
    }

    #[test]
    fn test_round_trip_within_half_cell() {
        let samples = [
            coord(45.5, 5.25),
            coord(-33.87, 151.21),
            coord(60.0, 5.0),
            coord(78.2, 15.6),
            coord(-79.5, -70.0),
            coord(0.001, -0.001),
            coord(38.89, -77.03),
        ];
        let precisions = [
            GridPrecision::Km1,
            GridPrecision::M100,
            GridPrecision::M10,
            GridPrecision::M1,
        ];
        for c in samples {
            for p in precisions {
                let grid = GridReference::encode(c, p).unwrap();
                let back = GridReference::decode(grid.as_str()).unwrap();

                let zone = zone_for(c.latitude(), c.longitude());
                let original = to_utm(c, zone);
                let decoded = to_utm(back, zone);
                let half_cell = p.cell_size_m() / 2.0 + 0.01;
                let de = (original.easting - decoded.easting).abs();
                let dn = (original.northing - decoded.northing).abs();
                assert!(de <= half_cell, "{c} at {p:?} -> {grid}: easting off by {de} m");
                assert!(dn <= half_cell, "{c} at {p:?} -> {grid}: northing off by {dn} m");
                assert!(distance(c, back) < p.cell_size_m());
            }
        }
    }

    #[test]
    fn test_polar_regions_rejected() {
        assert_eq!(
            GridReference::encode(coord(85.0, 0.0), GridPrecision::M1),
            Err(GridError::OutOfRange(85.0))
        );
        assert!(GridReference::encode(coord(-80.5, 0.0), GridPrecision::M1).is_err());
    }

    #[test]
    fn test_column_letter_rejects_easting_outside_zone() {
        assert_eq!(column_letter(1, 500_000.0), Ok('E'));
        assert_eq!(column_letter(2, 100_000.0), Ok('J'));
        assert_eq!(
            column_letter(1, 95_000.0),
            Err(GridError::EastingOutOfRange(95_000.0))
        );
        assert_eq!(
            column_letter(1, 900_000.0),
            Err(GridError::EastingOutOfRange(900_000.0))
        );
    }

    #[test]
    fn test_norway_exception_zone() {
        let grid = GridReference::encode(coord(60.0, 4.0), GridPrecision::Km1).unwrap();
        assert!(grid.as_str().starts_with("32V"), "{grid}");
    }

    #[test]
    fn test_parse_accepts_lowercase_and_spaces() {
        let grid: GridReference = "31n ea 00000 00000".parse().unwrap();
        assert_eq!(grid.as_str(), "31NEA0000000000");
        let short: GridReference = "4QFJ1234567890".parse().unwrap();
        assert_eq!(short.as_str(), "04QFJ1234567890");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "31NEA000000000".parse::<GridReference>(),
            Err(GridError::Malformed(_, _))
        ));
        assert!("31IEA0000000000".parse::<GridReference>().is_err());
        assert!("99NEA0000000000".parse::<GridReference>().is_err());
        assert!("31NEA00000A0000".parse::<GridReference>().is_err());
        // column J belongs to the second letter set, not zone 31
        assert!("31NJA0000000000".parse::<GridReference>().is_err());
    }
}
