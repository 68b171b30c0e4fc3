//! Log-distance path-loss model

use crate::core::NOMINAL_RSSI_SIGMA_DB;

/// Converts signal strength to an estimated range for a calibrated
/// environment.
///
/// Stateless and deterministic; calibration is per-run configuration,
/// never per-observation.
#[derive(Debug, Clone)]
pub struct PathLossModel {
    /// Expected RSSI one meter from the emitter (dBm)
    pub reference_rssi_at_1m: f64,
    /// Empirical decay exponent for the environment (> 0)
    pub path_loss_exponent: f64,
    /// Free-form environment label carried for diagnostics
    pub environment_tag: String,
}

impl PathLossModel {
    pub fn new(reference_rssi_at_1m: f64, path_loss_exponent: f64, environment_tag: String) -> Self {
        Self {
            reference_rssi_at_1m,
            path_loss_exponent,
            environment_tag,
        }
    }

    /// Estimated range in meters for a measured RSSI:
    /// `10 ^ ((reference - rssi) / (10 * exponent))`
    pub fn distance_m(&self, rssi: f64) -> f64 {
        10f64.powf((self.reference_rssi_at_1m - rssi) / (10.0 * self.path_loss_exponent))
    }

    /// RSSI the model predicts at the given range
    pub fn expected_rssi(&self, distance_m: f64) -> f64 {
        self.reference_rssi_at_1m - 10.0 * self.path_loss_exponent * distance_m.max(1e-3).log10()
    }

    /// First-order propagation of RSSI noise into range noise at the
    /// operating point implied by `rssi`:
    /// `sigma_d = d * ln(10) / (10 * exponent) * sigma_rssi`
    pub fn range_sigma_m(&self, rssi: f64, rssi_sigma_db: f64) -> f64 {
        let distance = self.distance_m(rssi);
        distance * std::f64::consts::LN_10 / (10.0 * self.path_loss_exponent) * rssi_sigma_db
    }

    /// Range noise floor at the operating point, under nominal shadowing
    pub fn noise_floor_m(&self, rssi: f64) -> f64 {
        self.range_sigma_m(rssi, NOMINAL_RSSI_SIGMA_DB)
    }
}
