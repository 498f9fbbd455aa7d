use serde::{Deserialize, Serialize};

use crate::geo::EARTH_RADIUS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefractionParams {
    pub k_factor: f64,
}

impl Default for RefractionParams {
    fn default() -> Self {
        Self { k_factor: 4.0 / 3.0 }
    }
}

pub fn effective_earth_radius(params: RefractionParams) -> f64 {
    EARTH_RADIUS * params.k_factor
}

/// Radio horizon of an antenna `height_m` above ground, with a secondary
/// ducting term folded into the square root. Metres.
pub fn ducted_horizon_m(params: RefractionParams, height_m: f64, ducting_term: f64) -> f64 {
    (2.0 * effective_earth_radius(params) * height_m.max(0.0) + ducting_term * ducting_term).sqrt()
}

/// Optical line-of-sight reach between two antennas including the ducting
/// terms, in kilometres.
///
/// The transmitter horizon carries the frequency (MHz) and the receiver
/// horizon the ambient temperature (°F) in the place where the geometric
/// formula has the antenna height squared. The values are kept as they are
/// because existing range tables were produced with them.
pub fn optical_distance_with_ducting_km(
    transmitter_height_m: f64,
    receiver_height_m: f64,
    frequency_mhz: f64,
    ambient_temp_f: f64,
    params: RefractionParams,
) -> f64 {
    let transmitter = ducted_horizon_m(params, transmitter_height_m, frequency_mhz);
    let receiver = ducted_horizon_m(params, receiver_height_m, ambient_temp_f);
    (transmitter + receiver) / 1000.0
}
