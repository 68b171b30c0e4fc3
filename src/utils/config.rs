//! Engine configuration with validation

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::EstimatorMethod;

/// Relative weight of each estimator in the ensemble.
///
/// Weights must be finite, non-negative, and sum to something positive;
/// validation normalizes them to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub multilateration: f64,
    pub bayesian: f64,
    pub weighted_centroid: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            multilateration: 0.4,
            bayesian: 0.3,
            weighted_centroid: 0.3,
        }
    }
}

impl EnsembleWeights {
    pub fn weight_for(&self, method: EstimatorMethod) -> f64 {
        match method {
            EstimatorMethod::Multilateration => self.multilateration,
            EstimatorMethod::Bayesian => self.bayesian,
            EstimatorMethod::WeightedCentroid => self.weighted_centroid,
        }
    }

    pub fn sum(&self) -> f64 {
        self.multilateration + self.bayesian + self.weighted_centroid
    }

    fn normalize(&mut self) {
        let total = self.sum();
        self.multilateration /= total;
        self.bayesian /= total;
        self.weighted_centroid /= total;
    }
}

/// Recognized engine options.
///
/// Read-only for the duration of a run and shared by every concurrent
/// pipeline instance; estimators never read ambient settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smooth observer tracks before estimation
    pub kalman_enable: bool,
    /// Motion-model noise; lower values smooth harder
    pub kalman_process_variance: f64,
    /// Expected GPS noise
    pub kalman_measurement_variance: f64,
    /// Neighborhood radius for density clustering (meters)
    pub outlier_eps_m: f64,
    /// Neighbors (including the point itself) required for a core point
    pub outlier_min_samples: usize,
    /// Expected RSSI one meter from the emitter (dBm)
    pub path_loss_reference_rssi: f64,
    /// Empirical decay exponent, environment dependent
    pub path_loss_exponent: f64,
    /// Environment label carried into the path-loss model
    pub environment_tag: String,
    /// Exponent for the weighted-centroid signal weighting
    pub centroid_weight_power: f64,
    /// Fewest usable observations for which an estimate is emitted
    pub min_points_for_confidence: usize,
    pub enable_multilateration: bool,
    pub enable_bayesian: bool,
    /// When false, only `primary_algorithm`'s result is used
    pub enable_ensemble: bool,
    pub primary_algorithm: EstimatorMethod,
    pub ensemble_weights: EnsembleWeights,
    /// Position-update norm at which iterative solvers stop (meters)
    pub convergence_threshold_m: f64,
    /// Hard cap on solver iterations; the engine's sole timeout mechanism
    pub max_iterations: usize,
    /// Confidence below this sets the `low_confidence` flag
    pub low_confidence_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kalman_enable: true,
            kalman_process_variance: 1e-4,
            kalman_measurement_variance: 1e-2,
            outlier_eps_m: 50.0,
            outlier_min_samples: 5,
            path_loss_reference_rssi: -40.0,
            path_loss_exponent: 2.7,
            environment_tag: "outdoor".to_string(),
            centroid_weight_power: 1.5,
            min_points_for_confidence: 5,
            enable_multilateration: true,
            enable_bayesian: true,
            enable_ensemble: true,
            primary_algorithm: EstimatorMethod::Multilateration,
            ensemble_weights: EnsembleWeights::default(),
            convergence_threshold_m: 0.01,
            max_iterations: 50,
            low_confidence_threshold: 0.3,
        }
    }
}

/// Configuration faults; fatal to the whole run
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    IoError {
        message: String,
    },
    SerializationError {
        message: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidParameter {
                parameter,
                value,
                reason,
            } => write!(f, "invalid parameter '{}' = '{}': {}", parameter, value, reason),
            ConfigError::IoError { message } => write!(f, "I/O error: {}", message),
            ConfigError::SerializationError { message } => {
                write!(f, "serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl EngineConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("failed to read config file '{}': {}", path_str, e),
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("failed to parse config file '{}': {}", path_str, e),
            })?;
        config.validated()
    }

    /// Check every recognized option and normalize the ensemble weights.
    /// Any error here aborts the run before a single record is processed.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if !(self.kalman_process_variance.is_finite() && self.kalman_process_variance > 0.0) {
            return Err(invalid(
                "kalman_process_variance",
                self.kalman_process_variance,
                "must be a positive finite number",
            ));
        }
        if !(self.kalman_measurement_variance.is_finite() && self.kalman_measurement_variance > 0.0)
        {
            return Err(invalid(
                "kalman_measurement_variance",
                self.kalman_measurement_variance,
                "must be a positive finite number",
            ));
        }
        if !(self.outlier_eps_m.is_finite() && self.outlier_eps_m > 0.0) {
            return Err(invalid(
                "outlier_eps_m",
                self.outlier_eps_m,
                "must be a positive finite number",
            ));
        }
        if self.outlier_min_samples < 1 {
            return Err(invalid(
                "outlier_min_samples",
                self.outlier_min_samples,
                "must be at least 1",
            ));
        }
        if !self.path_loss_reference_rssi.is_finite() {
            return Err(invalid(
                "path_loss_reference_rssi",
                self.path_loss_reference_rssi,
                "must be finite",
            ));
        }
        if !(self.path_loss_exponent.is_finite() && self.path_loss_exponent > 0.0) {
            return Err(invalid(
                "path_loss_exponent",
                self.path_loss_exponent,
                "must be a positive finite number",
            ));
        }
        if !self.centroid_weight_power.is_finite() {
            return Err(invalid(
                "centroid_weight_power",
                self.centroid_weight_power,
                "must be finite",
            ));
        }
        if self.min_points_for_confidence < 1 {
            return Err(invalid(
                "min_points_for_confidence",
                self.min_points_for_confidence,
                "must be at least 1",
            ));
        }
        if !(self.convergence_threshold_m.is_finite() && self.convergence_threshold_m > 0.0) {
            return Err(invalid(
                "convergence_threshold_m",
                self.convergence_threshold_m,
                "must be a positive finite number",
            ));
        }
        if self.max_iterations < 1 {
            return Err(invalid(
                "max_iterations",
                self.max_iterations,
                "must be at least 1",
            ));
        }
        if !(self.low_confidence_threshold.is_finite()
            && (0.0..=1.0).contains(&self.low_confidence_threshold))
        {
            return Err(invalid(
                "low_confidence_threshold",
                self.low_confidence_threshold,
                "must lie in [0, 1]",
            ));
        }

        let weights = [
            ("ensemble_weights.multilateration", self.ensemble_weights.multilateration),
            ("ensemble_weights.bayesian", self.ensemble_weights.bayesian),
            ("ensemble_weights.weighted_centroid", self.ensemble_weights.weighted_centroid),
        ];
        for (parameter, weight) in weights {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(invalid(parameter, weight, "must be finite and non-negative"));
            }
        }
        if self.ensemble_weights.sum() <= 0.0 {
            return Err(invalid(
                "ensemble_weights",
                self.ensemble_weights.sum(),
                "weights must sum to a positive value",
            ));
        }
        self.ensemble_weights.normalize();

        Ok(self)
    }
}
