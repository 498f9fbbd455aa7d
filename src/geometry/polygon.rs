//! Ordering of small point sets into simple polygons, and their area.

use std::cmp::Ordering;
use std::f64::consts::{PI, TAU};

use itertools::Itertools;

use super::PlanePoint;
use crate::geo::Coordinate;

/// Metres per degree, applied to both axes (small-extent approximation).
pub const METERS_PER_DEGREE: f64 = 111_139.0;

pub const SQUARE_METERS_PER_ACRE: f64 = 4046.856;

/// Clockwise angle from north about `pivot`, then distance from it.
/// The pivot itself (or a duplicate of it) sorts first.
fn clockwise_key(pivot: PlanePoint, p: PlanePoint) -> (f64, f64) {
    let (dx, dy) = (p.x - pivot.x, p.y - pivot.y);
    let length = dx.hypot(dy);
    if length == 0.0 {
        return (-PI, 0.0);
    }
    let angle = (dx / length).atan2(dy / length);
    if angle < 0.0 {
        (TAU + angle, length)
    } else {
        (angle, length)
    }
}

fn compare_keys(a: (f64, f64), b: (f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

/// Orders points into a simple polygon.
///
/// The pivot is the point with the largest (longitude, latitude); everything
/// else is swept clockwise around it. Only convex sets are guaranteed to come
/// out simple, which is all the envelope and fix generators produce.
/// Longitudes are compared about the first point's meridian.
pub fn order(points: &[Coordinate]) -> Vec<Coordinate> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let meridian = first.longitude();
    let plane = |c: &Coordinate| PlanePoint::about(*c, meridian);

    let Some(pivot) = points
        .iter()
        .map(plane)
        .max_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
    else {
        return Vec::new();
    };

    points
        .iter()
        .copied()
        .sorted_by(|a, b| {
            compare_keys(
                clockwise_key(pivot, plane(a)),
                clockwise_key(pivot, plane(b)),
            )
        })
        .collect()
}

/// Shoelace area in square metres, positive for counter-clockwise rings.
pub fn signed_area_m2(ring: &[Coordinate]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    // relative to the first vertex to keep the products small
    let meridian = ring[0].longitude();
    let origin = PlanePoint::about(ring[0], meridian);
    let to_meters = |c: &Coordinate| {
        let p = PlanePoint::about(*c, meridian);
        (
            (p.x - origin.x) * METERS_PER_DEGREE,
            (p.y - origin.y) * METERS_PER_DEGREE,
        )
    };

    let twice_area: f64 = ring
        .iter()
        .map(to_meters)
        .circular_tuple_windows()
        .map(|((x1, y1), (x2, y2))| x1 * y2 - x2 * y1)
        .sum();
    twice_area / 2.0
}

/// Area of an ordered ring in acres.
pub fn area_acres(ring: &[Coordinate]) -> f64 {
    signed_area_m2(ring).abs() / SQUARE_METERS_PER_ACRE
}
