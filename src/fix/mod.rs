//! Multi-sensor fix resolution.
//!
//! Up to three LOB envelopes are combined according to which centerlines
//! actually cross:
//!
//! | sensors | crossing pairs | result                          |
//! |---------|----------------|---------------------------------|
//! | 1       | –              | LOB                             |
//! | 2       | 1              | CUT                             |
//! | 2       | 0              | LOB per sensor                  |
//! | 3       | 3              | FIX                             |
//! | 3       | 1              | CUT + LOB of the third sensor   |
//! | 3       | 2              | MULTI_CUT (two CUTs)            |
//! | 3       | 0              | LOB per sensor                  |

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::{FixError, FixResult};
use crate::geo::grid::{GridPrecision, GridReference};
use crate::geo::{Coordinate, centroid, distance};
use crate::geometry::{Intersection, area_acres, order, segments_cross};
use crate::lob::{LobEnvelope, SensorId, SensorReport};
use crate::physics::RfParameters;

pub const MAX_SENSORS: usize = 3;

/// Slot pairs in the order crossing flags are given: (1,2), (1,3), (2,3).
pub const SLOT_PAIRS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Lob,
    Cut,
    Fix,
    MultiCut,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Lob => "LOB",
            Classification::Cut => "CUT",
            Classification::Fix => "FIX",
            Classification::MultiCut => "MULTI_CUT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorArea {
    Acres(f64),
    Indeterminate,
}

impl ErrorArea {
    pub fn acres(self) -> Option<f64> {
        match self {
            ErrorArea::Acres(a) => Some(a),
            ErrorArea::Indeterminate => None,
        }
    }
}

impl Serialize for ErrorArea {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ErrorArea::Acres(a) => serializer.serialize_f64(*a),
            ErrorArea::Indeterminate => serializer.serialize_str("indeterminate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorDistance {
    Meters(f64),
    NotApplicable,
}

impl SensorDistance {
    pub fn meters(self) -> Option<f64> {
        match self {
            SensorDistance::Meters(m) => Some(m),
            SensorDistance::NotApplicable => None,
        }
    }

    /// Keeps the smaller of the two distances.
    fn merge(self, meters: f64) -> Self {
        match self {
            SensorDistance::Meters(current) if current <= meters => self,
            _ => SensorDistance::Meters(meters),
        }
    }
}

impl Serialize for SensorDistance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SensorDistance::Meters(m) => serializer.serialize_f64(*m),
            SensorDistance::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

/// One located emitter hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub kind: Classification,
    pub sensors: Vec<SensorId>,
    pub location: Coordinate,
    /// None where the grid does not reach (polar caps).
    pub grid: Option<GridReference>,
    pub error_polygon: Vec<Coordinate>,
    pub error_area: ErrorArea,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetEstimate {
    pub classification: Classification,
    pub targets: Vec<Target>,
    pub error_area: ErrorArea,
    pub sensor_distances: BTreeMap<SensorId, SensorDistance>,
    pub envelopes: Vec<LobEnvelope>,
}

impl TargetEstimate {
    /// The FIX/CUT target, or the only LOB.
    pub fn primary(&self) -> Option<&Target> {
        match self.classification {
            Classification::Fix | Classification::Cut => self.targets.first(),
            Classification::Lob if self.targets.len() == 1 => self.targets.first(),
            _ => None,
        }
    }

    pub fn locations(&self) -> Vec<Coordinate> {
        self.targets.iter().map(|t| t.location).collect()
    }

    pub fn envelope(&self, id: SensorId) -> Option<&LobEnvelope> {
        self.envelopes.iter().find(|e| e.sensor_id == id)
    }
}

/// How the present envelopes combine. Indices are sensor slots.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Lobs(Vec<usize>),
    Cut {
        pair: (usize, usize),
        lone: Option<usize>,
    },
    MultiCut([(usize, usize); 2]),
    Fix,
}

impl Plan {
    fn classification(&self) -> Classification {
        match self {
            Plan::Lobs(_) => Classification::Lob,
            Plan::Cut { .. } => Classification::Cut,
            Plan::MultiCut(_) => Classification::MultiCut,
            Plan::Fix => Classification::Fix,
        }
    }
}

fn pair_plan(pair: (usize, usize), crosses: bool) -> Plan {
    if crosses {
        Plan::Cut { pair, lone: None }
    } else {
        Plan::Lobs(vec![pair.0, pair.1])
    }
}

/// `crossings` follows [`SLOT_PAIRS`]; flags for pairs with an absent
/// sensor are ignored.
fn plan(present: [bool; MAX_SENSORS], crossings: [bool; 3]) -> Option<Plan> {
    let [ab, ac, bc] = crossings;
    let plan = match present {
        [false, false, false] => return None,
        [true, false, false] => Plan::Lobs(vec![0]),
        [false, true, false] => Plan::Lobs(vec![1]),
        [false, false, true] => Plan::Lobs(vec![2]),
        [true, true, false] => pair_plan((0, 1), ab),
        [true, false, true] => pair_plan((0, 2), ac),
        [false, true, true] => pair_plan((1, 2), bc),
        [true, true, true] => match (ab, ac, bc) {
            (true, true, true) => Plan::Fix,
            (true, false, false) => Plan::Cut {
                pair: (0, 1),
                lone: Some(2),
            },
            (false, true, false) => Plan::Cut {
                pair: (0, 2),
                lone: Some(1),
            },
            (false, false, true) => Plan::Cut {
                pair: (1, 2),
                lone: Some(0),
            },
            (true, true, false) => Plan::MultiCut([(0, 1), (0, 2)]),
            (true, false, true) => Plan::MultiCut([(0, 1), (1, 2)]),
            (false, true, true) => Plan::MultiCut([(0, 2), (1, 2)]),
            (false, false, false) => Plan::Lobs(vec![0, 1, 2]),
        },
    };
    Some(plan)
}

/// Decision table on its own: which classification a presence pattern and
/// crossing pattern yields. None when no sensor is present.
pub fn classify(present: [bool; MAX_SENSORS], crossings: [bool; 3]) -> Option<Classification> {
    plan(present, crossings).map(|p| p.classification())
}

/// Whether the near-to-far centerlines of two envelopes cross.
pub fn centerlines_cross(a: &LobEnvelope, b: &LobEnvelope) -> bool {
    let meridian = a.meridian();
    let (a1, a2) = a.center.plane(meridian);
    let (b1, b2) = b.center.plane(meridian);
    segments_cross(a1, a2, b1, b2)
}

/// Crossing point of two centerlines already known to cross.
pub fn centerline_intersection(a: &LobEnvelope, b: &LobEnvelope) -> FixResult<Coordinate> {
    let meridian = a.meridian();
    let la = a.center.line(meridian);
    let lb = b.center.line(meridian);
    let unstable = || FixError::NumericalInstability {
        first: a.sensor_id,
        second: b.sensor_id,
        determinant: la.determinant(&lb),
    };
    if la.is_ill_conditioned_with(&lb) {
        return Err(unstable());
    }
    match la.intersect(&lb) {
        Intersection::Point(p) => Ok(p.to_coordinate()?),
        Intersection::Parallel => Err(unstable()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixResolver {
    pub precision: GridPrecision,
}

impl FixResolver {
    pub fn new(precision: GridPrecision) -> Self {
        Self { precision }
    }

    pub fn resolve(
        &self,
        reports: &[Option<SensorReport>; MAX_SENSORS],
        params: &RfParameters,
    ) -> FixResult<TargetEstimate> {
        let mut envelopes: [Option<LobEnvelope>; MAX_SENSORS] = [None, None, None];
        for (slot, report) in reports.iter().enumerate() {
            if let Some(report) = report {
                let id = SensorId(slot as u8 + 1);
                envelopes[slot] = Some(LobEnvelope::from_report(id, *report, params)?);
            }
        }

        let present = envelopes.each_ref().map(Option::is_some);
        let crossings = SLOT_PAIRS.map(|(i, j)| match (&envelopes[i], &envelopes[j]) {
            (Some(a), Some(b)) => centerlines_cross(a, b),
            _ => false,
        });
        let plan = plan(present, crossings).ok_or(FixError::NoSensors)?;
        debug!(?present, ?crossings, ?plan, "resolving sensor topology");

        // every slot named by the plan is present
        let env = |slot: usize| envelopes[slot].as_ref().ok_or(FixError::NoSensors);

        let targets = match &plan {
            Plan::Lobs(slots) => slots
                .iter()
                .map(|&slot| self.lob_target(env(slot)?))
                .collect::<FixResult<Vec<_>>>()?,
            Plan::Cut { pair, lone } => {
                let mut targets = vec![self.cut_target(env(pair.0)?, env(pair.1)?)?];
                if let Some(slot) = lone {
                    targets.push(self.lob_target(env(*slot)?)?);
                }
                targets
            }
            Plan::MultiCut(pairs) => pairs
                .iter()
                .map(|&(i, j)| self.cut_target(env(i)?, env(j)?))
                .collect::<FixResult<Vec<_>>>()?,
            Plan::Fix => vec![self.fix_target(env(0)?, env(1)?, env(2)?)?],
        };

        let error_area = match &plan {
            Plan::Lobs(slots) if slots.len() == 1 => targets[0].error_area,
            Plan::Lobs(_) | Plan::MultiCut(_) => ErrorArea::Indeterminate,
            Plan::Cut { .. } | Plan::Fix => targets[0].error_area,
        };

        let envelopes: Vec<LobEnvelope> = envelopes.into_iter().flatten().collect();
        let sensor_distances = sensor_distances(&envelopes, &targets);
        let classification = plan.classification();
        debug!(%classification, targets = targets.len(), "resolution complete");

        Ok(TargetEstimate {
            classification,
            targets,
            error_area,
            sensor_distances,
            envelopes,
        })
    }

    fn grid(&self, location: Coordinate) -> Option<GridReference> {
        match GridReference::encode(location, self.precision) {
            Ok(grid) => Some(grid),
            Err(err) => {
                warn!(%location, %err, "target has no grid reference");
                None
            }
        }
    }

    fn lob_target(&self, env: &LobEnvelope) -> FixResult<Target> {
        let location = env.midpoint()?;
        Ok(Target {
            kind: Classification::Lob,
            sensors: vec![env.sensor_id],
            location,
            grid: self.grid(location),
            error_polygon: env.error_polygon.clone(),
            error_area: ErrorArea::Acres(env.error_area_acres),
        })
    }

    /// Target at the centerline crossing, bounded by where the boundary rays
    /// of one envelope meet those of the other. If any of the four corners is
    /// unusable the remaining ones are kept for display and the area is
    /// indeterminate.
    fn cut_target(&self, a: &LobEnvelope, b: &LobEnvelope) -> FixResult<Target> {
        let location = centerline_intersection(a, b)?;
        let meridian = a.meridian();

        let mut corners = Vec::with_capacity(4);
        for (ra, rb) in a.boundaries().into_iter().cartesian_product(b.boundaries()) {
            match ra.line(meridian).intersect(&rb.line(meridian)) {
                Intersection::Point(p) => match p.to_coordinate() {
                    Ok(corner) => corners.push(corner),
                    Err(err) => warn!(
                        first = %a.sensor_id,
                        second = %b.sensor_id,
                        %err,
                        "dropping CUT corner off the globe"
                    ),
                },
                Intersection::Parallel => warn!(
                    first = %a.sensor_id,
                    second = %b.sensor_id,
                    "dropping CUT corner of parallel boundaries"
                ),
            }
        }

        let error_polygon = order(&corners);
        let error_area = if error_polygon.len() == 4 {
            ErrorArea::Acres(area_acres(&error_polygon))
        } else {
            ErrorArea::Indeterminate
        };

        Ok(Target {
            kind: Classification::Cut,
            sensors: vec![a.sensor_id, b.sensor_id],
            location,
            grid: self.grid(location),
            error_polygon,
            error_area,
        })
    }

    fn fix_target(&self, a: &LobEnvelope, b: &LobEnvelope, c: &LobEnvelope) -> FixResult<Target> {
        let corners = [
            centerline_intersection(a, b)?,
            centerline_intersection(a, c)?,
            centerline_intersection(b, c)?,
        ];
        let location = centroid(&corners)?;
        let error_polygon = order(&corners);
        let error_area = ErrorArea::Acres(area_acres(&error_polygon));

        Ok(Target {
            kind: Classification::Fix,
            sensors: vec![a.sensor_id, b.sensor_id, c.sensor_id],
            location,
            grid: self.grid(location),
            error_polygon,
            error_area,
        })
    }
}

/// Distance from each sensor to the targets it took part in; a sensor in
/// more than one target keeps the smallest.
fn sensor_distances(
    envelopes: &[LobEnvelope],
    targets: &[Target],
) -> BTreeMap<SensorId, SensorDistance> {
    let mut distances: BTreeMap<SensorId, SensorDistance> = (1..=MAX_SENSORS as u8)
        .map(|slot| (SensorId(slot), SensorDistance::NotApplicable))
        .collect();

    for target in targets {
        for id in &target.sensors {
            let Some(env) = envelopes.iter().find(|e| e.sensor_id == *id) else {
                continue;
            };
            let meters = distance(env.report.location, target.location);
            if let Some(entry) = distances.get_mut(id) {
                *entry = entry.merge(meters);
            }
        }
    }
    distances
}

/// Resolves with the default 1 m grid precision.
pub fn resolve(
    reports: &[Option<SensorReport>; MAX_SENSORS],
    params: &RfParameters,
) -> FixResult<TargetEstimate> {
    FixResolver::default().resolve(reports, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lob::Ray;
    use crate::physics::RangeBound;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn ray(near: (f64, f64), far: (f64, f64)) -> Ray {
        Ray {
            near: coord(near.0, near.1),
            far: coord(far.0, far.1),
        }
    }

    fn envelope(id: u8, center: Ray, left: Ray, right: Ray) -> LobEnvelope {
        LobEnvelope {
            sensor_id: SensorId(id),
            report: SensorReport {
                location: center.near,
                bearing_deg: 0.0,
                received_power_dbm: -80.0,
                angular_error_deg: 3.0,
            },
            range: RangeBound::new(0.0, 1_000.0, 0.0),
            center,
            left,
            right,
            error_polygon: vec![left.near, left.far, right.far, right.near],
            error_area_acres: 0.0,
        }
    }

    #[test]
    fn test_no_sensors_has_no_classification() {
        for crossings in all_crossings() {
            assert_eq!(classify([false; 3], crossings), None);
        }
    }

    fn all_crossings() -> Vec<[bool; 3]> {
        (0..8u8)
            .map(|bits| [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0])
            .collect()
    }

    #[test]
    fn test_decision_table_is_total() {
        for presence_bits in 1..8u8 {
            let present = [
                presence_bits & 1 != 0,
                presence_bits & 2 != 0,
                presence_bits & 4 != 0,
            ];
            let count = present.iter().filter(|p| **p).count();
            for crossings in all_crossings() {
                let class = classify(present, crossings).expect("present sensors classify");
                let relevant: usize = SLOT_PAIRS
                    .iter()
                    .zip(crossings)
                    .filter(|((i, j), crosses)| present[*i] && present[*j] && *crosses)
                    .count();
                let expected = match (count, relevant) {
                    (1, _) => Classification::Lob,
                    (2, 0) => Classification::Lob,
                    (2, _) => Classification::Cut,
                    (3, 0) => Classification::Lob,
                    (3, 1) => Classification::Cut,
                    (3, 2) => Classification::MultiCut,
                    (3, _) => Classification::Fix,
                    _ => unreachable!(),
                };
                assert_eq!(class, expected, "present {present:?} crossings {crossings:?}");
            }
        }
    }

    #[test]
    fn test_single_cut_keeps_third_sensor() {
        assert_eq!(
            plan([true; 3], [false, true, false]),
            Some(Plan::Cut {
                pair: (0, 2),
                lone: Some(1)
            })
        );
        assert_eq!(
            plan([true; 3], [true, false, true]),
            Some(Plan::MultiCut([(0, 1), (1, 2)]))
        );
    }

    #[test]
    fn test_absent_pairs_are_ignored() {
        // crossing flag for (1,2) is meaningless when sensor 2 is missing
        assert_eq!(
            classify([true, false, true], [true, false, false]),
            Some(Classification::Lob)
        );
    }

    #[test]
    fn test_cut_with_a_corner_off_the_globe_is_indeterminate() {
        // A's left boundary and B's right boundary are nearly parallel and
        // only meet near latitude 100
        let a = envelope(
            1,
            ray((0.0, 0.0), (1.0, 0.005)),
            ray((0.0, 0.0), (1.0, 0.0)),
            ray((0.0, 0.0), (1.0, 0.01)),
        );
        let b = envelope(
            2,
            ray((0.0, 0.005), (0.01, -0.005)),
            ray((0.0, 0.01), (0.02, -0.01)),
            ray((0.0, 0.001), (10.0, 0.0009)),
        );

        let cut = FixResolver::default().cut_target(&a, &b).unwrap();
        assert_eq!(cut.error_polygon.len(), 3);
        assert_eq!(cut.error_area, ErrorArea::Indeterminate);
        assert!(cut.error_polygon.iter().all(|c| c.latitude() < 1.0));
    }

    #[test]
    fn test_centerlines_cross_over_the_antimeridian() {
        let a = envelope(
            1,
            ray((-17.01, 179.99), (-16.99, -179.99)),
            ray((-17.01, 179.99), (-16.99, -179.99)),
            ray((-17.01, 179.99), (-16.99, -179.99)),
        );
        let b = envelope(
            2,
            ray((-16.99, 179.99), (-17.01, -179.99)),
            ray((-16.99, 179.99), (-17.01, -179.99)),
            ray((-16.99, 179.99), (-17.01, -179.99)),
        );
        assert!(centerlines_cross(&a, &b));
        let p = centerline_intersection(&a, &b).unwrap();
        assert!((p.latitude() + 17.0).abs() < 1e-7);
        assert!((p.longitude().abs() - 180.0).abs() < 1e-7, "got {p}");
    }

    #[test]
    fn test_distance_merge_keeps_minimum() {
        let d = SensorDistance::NotApplicable.merge(500.0).merge(700.0).merge(300.0);
        assert_eq!(d, SensorDistance::Meters(300.0));
    }

    #[test]
    fn test_serialized_placeholders() {
        assert_eq!(
            serde_json::to_string(&SensorDistance::NotApplicable).unwrap(),
            "\"N/A\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorArea::Indeterminate).unwrap(),
            "\"indeterminate\""
        );
        assert_eq!(
            serde_json::to_string(&Classification::MultiCut).unwrap(),
            "\"MULTI_CUT\""
        );
    }
}
