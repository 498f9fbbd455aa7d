//! Planar line arithmetic on (longitude, latitude) treated as (x, y).
//!
//! Line form: `a·x + b·y = c` with `a = y1 − y2`, `b = x2 − x1`,
//! `c = x2·y1 − x1·y2`. Callers never rebuild the coefficients themselves.

use super::PlanePoint;

/// Relative determinant (sine of the angle between the two lines) below which
/// an intersection is considered numerically unreliable.
pub const ILL_CONDITIONED_SINE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    Point(PlanePoint),
    /// Determinant exactly zero: parallel or coincident.
    Parallel,
}

impl Line {
    pub fn through(p1: PlanePoint, p2: PlanePoint) -> Self {
        Self {
            a: p1.y - p2.y,
            b: p2.x - p1.x,
            c: p2.x * p1.y - p1.x * p2.y,
        }
    }

    pub fn determinant(&self, other: &Line) -> f64 {
        self.a * other.b - self.b * other.a
    }

    /// Determinant normalised by both normal lengths, i.e. the sine of the
    /// angle between the lines. Zero-length lines yield 0.
    pub fn relative_determinant(&self, other: &Line) -> f64 {
        let scale = self.a.hypot(self.b) * other.a.hypot(other.b);
        if scale == 0.0 {
            return 0.0;
        }
        self.determinant(other) / scale
    }

    pub fn is_ill_conditioned_with(&self, other: &Line) -> bool {
        self.relative_determinant(other).abs() < ILL_CONDITIONED_SINE
    }

    /// Cramer's rule on the 2×2 system.
    pub fn intersect(&self, other: &Line) -> Intersection {
        let d = self.determinant(other);
        if d == 0.0 {
            return Intersection::Parallel;
        }
        let dx = self.c * other.b - self.b * other.c;
        let dy = self.a * other.c - self.c * other.a;
        Intersection::Point(PlanePoint::new(dx / d, dy / d))
    }

    pub fn contains(&self, p: PlanePoint, tolerance: f64) -> bool {
        (self.a * p.x + self.b * p.y - self.c).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Clockwise,
    CounterClockwise,
    Collinear,
}

fn orientation(p: PlanePoint, q: PlanePoint, r: PlanePoint) -> Orientation {
    let cross = (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
    if cross > 0.0 {
        Orientation::CounterClockwise
    } else if cross < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

/// Whether segment `a1–a2` crosses segment `b1–b2`.
///
/// Works on orientations only, so it is independent of [`Line`]. A
/// non-collinear touch at an endpoint counts; collinear overlap does not,
/// since there is no single crossing point to report.
pub fn segments_cross(a1: PlanePoint, a2: PlanePoint, b1: PlanePoint, b2: PlanePoint) -> bool {
    let o1 = orientation(a1, a2, b1);
    let o2 = orientation(a1, a2, b2);
    let o3 = orientation(b1, b2, a1);
    let o4 = orientation(b1, b2, a2);

    let all_collinear = [o1, o2, o3, o4]
        .iter()
        .all(|o| *o == Orientation::Collinear);
    if all_collinear {
        return false;
    }
    o1 != o2 && o3 != o4
}
