use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fix::{MAX_SENSORS, TargetEstimate};
use crate::lob::{SensorId, SensorReport};
use crate::physics::RfParameters;

/// One resolution request: a shared RF hypothesis and up to three reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub rf: RfParameters,
    pub sensors: [Option<SensorReport>; MAX_SENSORS],
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("Scenario has no sensor reports")]
    NoSensors,
    #[error("{0}: bearing {1} is outside [0, 360)")]
    Bearing(SensorId, f64),
    #[error("{0}: received power {1} dBm must be at or below 0")]
    ReceivedPower(SensorId, f64),
    #[error("{0}: angular error {1} must be positive")]
    AngularError(SensorId, f64),
    #[error("Path loss coefficient {0} must be at least 2")]
    PathLossCoefficient(f64),
    #[error("Transmit power range {min} W .. {max} W is invalid")]
    PowerRange { min: f64, max: f64 },
    #[error("Frequency {0} MHz must be positive")]
    Frequency(f64),
}

impl Scenario {
    /// Business-rule checks the engine itself does not repeat.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let rf = &self.rf;
        if !(rf.path_loss_coefficient >= 2.0) {
            return Err(ScenarioError::PathLossCoefficient(rf.path_loss_coefficient));
        }
        if !(rf.min_power_watts > 0.0 && rf.max_power_watts >= rf.min_power_watts) {
            return Err(ScenarioError::PowerRange {
                min: rf.min_power_watts,
                max: rf.max_power_watts,
            });
        }
        if !(rf.frequency_mhz > 0.0) {
            return Err(ScenarioError::Frequency(rf.frequency_mhz));
        }

        let mut any = false;
        for (id, report) in self.reports() {
            any = true;
            if !(0.0..360.0).contains(&report.bearing_deg) {
                return Err(ScenarioError::Bearing(id, report.bearing_deg));
            }
            if !(report.received_power_dbm <= 0.0) {
                return Err(ScenarioError::ReceivedPower(id, report.received_power_dbm));
            }
            if !(report.angular_error_deg > 0.0) {
                return Err(ScenarioError::AngularError(id, report.angular_error_deg));
            }
        }
        if !any {
            return Err(ScenarioError::NoSensors);
        }
        Ok(())
    }

    pub fn reports(&self) -> impl Iterator<Item = (SensorId, &SensorReport)> {
        self.sensors
            .iter()
            .enumerate()
            .filter_map(|(slot, report)| report.as_ref().map(|r| (SensorId(slot as u8 + 1), r)))
    }
}

pub fn load_scenario_from_json(path: impl AsRef<Path>) -> anyhow::Result<Scenario> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening scenario {}", path.display()))?;
    let reader = BufReader::new(file);
    let scenario: Scenario = serde_json::from_reader(reader)
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    Ok(scenario)
}

pub fn write_estimate_json<W: Write>(writer: W, estimate: &TargetEstimate) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, estimate)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn save_estimate_to_json(path: impl AsRef<Path>, estimate: &TargetEstimate) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_estimate_json(file, estimate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "rf": { "frequency_mhz": 150.0, "path_loss_coefficient": 3.0 },
        "sensors": [
            { "location": { "latitude": 45.0, "longitude": 5.0 },
              "bearing_deg": 90.0, "received_power_dbm": -80.0, "angular_error_deg": 3.0 },
            null,
            { "location": { "latitude": 45.02, "longitude": 5.0 },
              "bearing_deg": 120.0, "received_power_dbm": -75.0, "angular_error_deg": 4.0 }
        ]
    }"#;

    fn scenario() -> Scenario {
        serde_json::from_str(SCENARIO).unwrap()
    }

    #[test]
    fn test_parse_fills_rf_defaults() {
        let s = scenario();
        assert_eq!(s.rf.receiver_height_m, RfParameters::default().receiver_height_m);
        assert_eq!(s.rf.path_loss_coefficient, 3.0);
        assert!(s.sensors[1].is_none());
        let ids: Vec<SensorId> = s.reports().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![SensorId(1), SensorId(3)]);
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_validation_rejects_business_rule_violations() {
        let mut s = scenario();
        if let Some(r) = s.sensors[0].as_mut() {
            r.bearing_deg = 360.0;
        }
        assert_eq!(s.validate(), Err(ScenarioError::Bearing(SensorId(1), 360.0)));

        let mut s = scenario();
        if let Some(r) = s.sensors[2].as_mut() {
            r.received_power_dbm = 3.0;
        }
        assert!(matches!(s.validate(), Err(ScenarioError::ReceivedPower(SensorId(3), _))));

        let mut s = scenario();
        s.rf.path_loss_coefficient = 1.5;
        assert_eq!(s.validate(), Err(ScenarioError::PathLossCoefficient(1.5)));

        let mut s = scenario();
        s.rf.max_power_watts = s.rf.min_power_watts / 2.0;
        assert!(matches!(s.validate(), Err(ScenarioError::PowerRange { .. })));

        let mut s = scenario();
        s.sensors = [None, None, None];
        assert_eq!(s.validate(), Err(ScenarioError::NoSensors));
    }

    #[test]
    fn test_invalid_location_fails_to_parse() {
        let bad = SCENARIO.replace("45.02", "95.02");
        assert!(serde_json::from_str::<Scenario>(&bad).is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_scenario_from_json("/nonexistent/scenario.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/scenario.json"));
    }
}
