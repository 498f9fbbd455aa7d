//! Line-of-bearing error envelopes.
//!
//! Each sensor's bearing is widened by its angular error into a cone, and the
//! cone is cut at the near/far range bounds of the propagation model. The
//! four cut points form the envelope's error polygon.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeoResult;
use crate::geo::{Coordinate, centroid, normalize_bearing, project};
use crate::geometry::{Line, PlanePoint, area_acres, order};
use crate::physics::{RangeBound, RfParameters};

/// Distance between successive points along a boundary chain.
pub const LOB_STEP_M: f64 = 30.0;

/// Sensor slot number, 1..=3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub u8);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// One direction-finding report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    pub location: Coordinate,
    /// True bearing to the emitter, [0, 360)
    pub bearing_deg: f64,
    /// Received power, ≤ 0 dBm
    pub received_power_dbm: f64,
    /// Half-width of the bearing cone, > 0
    pub angular_error_deg: f64,
}

/// A chain's near and far cut points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ray {
    pub near: Coordinate,
    pub far: Coordinate,
}

impl Ray {
    /// Both cut points on the plane unwrapped about `meridian`.
    pub fn plane(&self, meridian: f64) -> (PlanePoint, PlanePoint) {
        (
            PlanePoint::about(self.near, meridian),
            PlanePoint::about(self.far, meridian),
        )
    }

    pub fn line(&self, meridian: f64) -> Line {
        let (near, far) = self.plane(meridian);
        Line::through(near, far)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobEnvelope {
    pub sensor_id: SensorId,
    pub report: SensorReport,
    pub range: RangeBound,
    pub center: Ray,
    /// Along `bearing - error`
    pub left: Ray,
    /// Along `bearing + error`
    pub right: Ray,
    pub error_polygon: Vec<Coordinate>,
    pub error_area_acres: f64,
}

impl LobEnvelope {
    pub fn from_report(
        sensor_id: SensorId,
        report: SensorReport,
        params: &RfParameters,
    ) -> GeoResult<Self> {
        let range = RangeBound::from_report(params, report.received_power_dbm);
        Self::build(sensor_id, report, range)
    }

    pub fn build(sensor_id: SensorId, report: SensorReport, range: RangeBound) -> GeoResult<Self> {
        let bearing = normalize_bearing(report.bearing_deg);
        let error = report.angular_error_deg;

        let center = walk_chain(report.location, bearing, &range)?;
        let left = walk_chain(report.location, normalize_bearing(bearing - error), &range)?;
        let right = walk_chain(report.location, normalize_bearing(bearing + error), &range)?;

        let error_polygon = order(&[right.near, right.far, left.far, left.near]);
        let error_area_acres = area_acres(&error_polygon);

        Ok(Self {
            sensor_id,
            report,
            range,
            center,
            left,
            right,
            error_polygon,
            error_area_acres,
        })
    }

    /// Single-sensor estimate: halfway along the centerline.
    pub fn midpoint(&self) -> GeoResult<Coordinate> {
        centroid(&[self.center.near, self.center.far])
    }

    pub fn boundaries(&self) -> [&Ray; 2] {
        [&self.left, &self.right]
    }

    /// Reference meridian for planar work on this envelope.
    pub fn meridian(&self) -> f64 {
        self.report.location.longitude()
    }
}

/// Cut points of a chain stepped out from `origin` in `LOB_STEP_M`
/// increments: the first step at or past the near bound, and the first step
/// at or past the far bound. A near bound beyond the far one collapses onto it.
fn walk_chain(origin: Coordinate, bearing_deg: f64, range: &RangeBound) -> GeoResult<Ray> {
    let step = LOB_STEP_M.min(range.far_m);
    let far_steps = (range.far_m / step).ceil().max(1.0);
    let near_steps = (range.near_m / step).ceil().clamp(1.0, far_steps);

    let far = project(origin, bearing_deg, far_steps * step)?;
    let near = if near_steps == far_steps {
        far
    } else {
        project(origin, bearing_deg, near_steps * step)?
    };
    Ok(Ray { near, far })
}
