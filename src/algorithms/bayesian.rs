//! Linearized-Gaussian range fusion estimator

use nalgebra::{Matrix2, Vector2};

use crate::algorithms::centroid::weighted_position;
use crate::algorithms::{geo, PathLossModel, PositionEstimator};
use crate::core::{
    EstimateFlags, EstimatorMethod, EstimatorResult, ObservationSet, NOMINAL_RSSI_SIGMA_DB,
};

/// Treats every observation as a noisy Gaussian range constraint (mean =
/// path-loss distance, sigma = RSSI noise propagated through the path-loss
/// curve) and fuses them under a linearized-Gaussian assumption.
///
/// Unlike the geometric solver, the reported residual is the posterior
/// 1-sigma radius `sqrt(trace(P))`, a statistically interpretable
/// uncertainty rather than a fit residual.
#[derive(Debug, Clone)]
pub struct BayesianEstimator {
    pub max_iterations: usize,
    /// Position-update norm below which the posterior is considered stable (m)
    pub convergence_threshold_m: f64,
}

impl BayesianEstimator {
    pub fn new(max_iterations: usize, convergence_threshold_m: f64) -> Self {
        Self {
            max_iterations,
            convergence_threshold_m,
        }
    }
}

/// Sample standard deviation of the set's RSSI values, floored at the
/// nominal shadowing sigma so a perfectly clean set still carries noise
fn empirical_rssi_sigma(rssi_values: &[f64]) -> f64 {
    if rssi_values.len() < 2 {
        return NOMINAL_RSSI_SIGMA_DB;
    }
    let n = rssi_values.len() as f64;
    let mean = rssi_values.iter().sum::<f64>() / n;
    let variance = rssi_values
        .iter()
        .map(|rssi| (rssi - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    variance.sqrt().max(NOMINAL_RSSI_SIGMA_DB)
}

impl PositionEstimator for BayesianEstimator {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::Bayesian
    }

    fn estimate(&self, set: &ObservationSet, model: &PathLossModel) -> Option<EstimatorResult> {
        let observations = &set.observations;
        if observations.len() < 3 {
            return None;
        }

        let reference = observations[0].observer;
        let points: Vec<Vector2<f64>> = observations
            .iter()
            .map(|observation| geo::to_local(observation.observer, reference))
            .collect();
        let ranges: Vec<f64> = observations
            .iter()
            .map(|observation| model.distance_m(observation.rssi))
            .collect();

        let rssi_values: Vec<f64> = observations.iter().map(|o| o.rssi).collect();
        let rssi_sigma = empirical_rssi_sigma(&rssi_values);
        let precisions: Vec<f64> = observations
            .iter()
            .map(|observation| {
                let sigma = model.range_sigma_m(observation.rssi, rssi_sigma).max(1.0);
                1.0 / (sigma * sigma)
            })
            .collect();

        let seed = weighted_position(observations, 1.0);
        let mut estimate = geo::to_local(seed, reference);
        let mut flags = EstimateFlags::default();
        let mut converged = false;
        let mut information = Matrix2::zeros();

        for _ in 0..self.max_iterations {
            let mut normal = Matrix2::zeros();
            let mut gradient = Vector2::zeros();

            for ((point, &range), &precision) in points.iter().zip(&ranges).zip(&precisions) {
                let offset = estimate - point;
                let hypothesized = offset.norm();
                if hypothesized < 1e-9 {
                    continue;
                }
                let unit = offset / hypothesized;
                let residual = hypothesized - range;
                normal += precision * unit * unit.transpose();
                gradient += precision * unit * residual;
            }

            let step = -geo::solve_normal_equations(&normal, &gradient)?;
            information = normal;
            estimate += step;
            if step.norm() < self.convergence_threshold_m {
                converged = true;
                break;
            }
        }

        if !converged {
            flags.non_converged = true;
        }

        // Posterior covariance of the linearized system
        let covariance = information.try_inverse()?;
        let sigma_radius = covariance.trace().max(0.0).sqrt();
        if !sigma_radius.is_finite() {
            return None;
        }

        Some(EstimatorResult {
            method: EstimatorMethod::Bayesian,
            position: geo::to_geodetic(estimate, reference),
            residual_error_m: sigma_radius,
            contributing_count: observations.len(),
            flags,
        })
    }
}
