use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geo::MIN_PROJECTION_DISTANCE_M;
use crate::physics::refraction::{RefractionParams, optical_distance_with_ducting_km};

/// Path loss intercept (dB) at 1 km and 1 MHz.
const PATH_LOSS_INTERCEPT_DB: f64 = 32.4;

/// Separation substituted when the near bound meets or passes the far bound.
pub const NOMINAL_RANGE_SEPARATION_M: f64 = 30.0;

/// Transmitter and receiver hypothesis shared by every sensor in a
/// resolution (single emitter).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RfParameters {
    pub frequency_mhz: f64,
    pub min_power_watts: f64,
    pub max_power_watts: f64,
    pub transmitter_gain_dbi: f64,
    pub receiver_gain_dbi: f64,
    pub transmitter_height_m: f64,
    pub receiver_height_m: f64,
    pub ambient_temp_f: f64,
    /// 2 = free space ... 5 = dense foliage
    pub path_loss_coefficient: f64,
    pub refraction: RefractionParams,
}

impl Default for RfParameters {
    fn default() -> Self {
        Self {
            frequency_mhz: 150.0,
            min_power_watts: 0.5,
            max_power_watts: 5.0,
            transmitter_gain_dbi: 0.0,
            receiver_gain_dbi: 2.15,
            transmitter_height_m: 1.5,
            receiver_height_m: 2.0,
            ambient_temp_f: 70.0,
            path_loss_coefficient: 3.0,
            refraction: RefractionParams::default(),
        }
    }
}

pub fn watts_to_dbm(power_watts: f64) -> f64 {
    10.0 * (1000.0 * power_watts).log10()
}

/// Inverse of the log-distance path loss model: the distance (km) at which a
/// transmitter of `power_watts` falls to `sensitivity_dbm` at the receiver.
pub fn path_loss_distance_km(
    power_watts: f64,
    frequency_mhz: f64,
    transmitter_gain_dbi: f64,
    receiver_gain_dbi: f64,
    sensitivity_dbm: f64,
    path_loss_coefficient: f64,
) -> f64 {
    let n = path_loss_coefficient;
    let exponent = (watts_to_dbm(power_watts) + transmitter_gain_dbi
        - PATH_LOSS_INTERCEPT_DB
        - 10.0 * n * frequency_mhz.log10()
        + receiver_gain_dbi
        - sensitivity_dbm)
        / (10.0 * n);
    10f64.powf(exponent)
}

/// Furthest distance (km) the emitter could be heard from, either by path
/// loss alone or also capped by the optical/ducting horizon.
pub fn max_emission_distance_km(
    params: &RfParameters,
    power_watts: f64,
    sensitivity_dbm: f64,
    pure_path_loss: bool,
) -> f64 {
    let path_loss = path_loss_distance_km(
        power_watts,
        params.frequency_mhz,
        params.transmitter_gain_dbi,
        params.receiver_gain_dbi,
        sensitivity_dbm,
        params.path_loss_coefficient,
    );
    if pure_path_loss {
        return path_loss;
    }
    path_loss.min(optical_horizon_km(params))
}

pub fn optical_horizon_km(params: &RfParameters) -> f64 {
    optical_distance_with_ducting_km(
        params.transmitter_height_m,
        params.receiver_height_m,
        params.frequency_mhz,
        params.ambient_temp_f,
        params.refraction,
    )
}

/// Near/far distance along a line of bearing where the emitter can be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub near_m: f64,
    pub far_m: f64,
    /// Optical/ducting reach. Informational, never applied to the bounds.
    pub horizon_m: f64,
}

impl RangeBound {
    /// Bounds for a sensor that heard the emitter at `received_power_dbm`:
    /// minimum transmit power gives the near bound, maximum the far bound.
    pub fn from_report(params: &RfParameters, received_power_dbm: f64) -> Self {
        let near_km = max_emission_distance_km(params, params.min_power_watts, received_power_dbm, true);
        let far_km = max_emission_distance_km(params, params.max_power_watts, received_power_dbm, true);
        Self::new(near_km * 1000.0, far_km * 1000.0, optical_horizon_km(params) * 1000.0)
    }

    /// Always yields `near_m < far_m` with a far bound long enough to project.
    pub fn new(near_m: f64, far_m: f64, horizon_m: f64) -> Self {
        let near = if near_m.is_finite() { near_m.max(0.0) } else { 0.0 };
        let mut far = if far_m.is_finite() { far_m } else { near };
        if far <= near {
            warn!(near_m, far_m, "degenerate range bound, substituting nominal separation");
            far = near + NOMINAL_RANGE_SEPARATION_M;
        }
        Self {
            near_m: near,
            far_m: far.max(MIN_PROJECTION_DISTANCE_M),
            horizon_m,
        }
    }

    pub fn span_m(&self) -> f64 {
        self.far_m - self.near_m
    }
}
