//! Signal-strength weighted centroid estimator

use crate::algorithms::{range_rms_residual_m, PathLossModel, PositionEstimator};
use crate::core::{
    EstimateFlags, EstimatorMethod, EstimatorResult, GeoPoint, Observation, ObservationSet,
    RSSI_MIN_DBM,
};

/// Non-iterative estimator: observer positions averaged with weights that
/// grow with signal strength (stronger signal means the observer stood
/// closer to the emitter).
///
/// Always succeeds given at least one observation, which also makes it the
/// conservative fallback for degenerate multilateration geometry.
#[derive(Debug, Clone)]
pub struct WeightedCentroid {
    /// Exponent applied to the signal margin; higher values concentrate
    /// weight on the strongest observations
    pub weight_power: f64,
}

impl WeightedCentroid {
    pub fn new(weight_power: f64) -> Self {
        Self { weight_power }
    }
}

/// Weight for one observation: the signal margin above the plausibility
/// floor, raised to the configured power
pub(crate) fn rssi_weight(rssi: f64, power: f64) -> f64 {
    (rssi - RSSI_MIN_DBM).max(1e-3).powf(power)
}

/// Weighted mean of observer positions under [`rssi_weight`]
pub(crate) fn weighted_position(observations: &[Observation], power: f64) -> GeoPoint {
    let mut weight_sum = 0.0;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    for observation in observations {
        let weight = rssi_weight(observation.rssi, power);
        weight_sum += weight;
        lat_sum += observation.observer.lat * weight;
        lon_sum += observation.observer.lon * weight;
    }
    GeoPoint::new(lat_sum / weight_sum, lon_sum / weight_sum)
}

impl PositionEstimator for WeightedCentroid {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::WeightedCentroid
    }

    fn estimate(&self, set: &ObservationSet, model: &PathLossModel) -> Option<EstimatorResult> {
        let observations = &set.observations;
        if observations.is_empty() {
            return None;
        }

        let position = weighted_position(observations, self.weight_power);
        Some(EstimatorResult {
            method: EstimatorMethod::WeightedCentroid,
            position,
            residual_error_m: range_rms_residual_m(observations, position, model),
            contributing_count: observations.len(),
            flags: EstimateFlags::default(),
        })
    }
}
