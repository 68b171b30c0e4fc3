//! Iterative weighted least-squares range solver

use nalgebra::{Matrix2, Vector2};

use crate::algorithms::centroid::weighted_position;
use crate::algorithms::{geo, range_rms_residual_m, PathLossModel, PositionEstimator};
use crate::core::{
    EstimateFlags, EstimatorMethod, EstimatorResult, Observation, ObservationSet,
};

/// Gauss-Newton solver over range constraints.
///
/// Each observation constrains the emitter to lie `distance(rssi)` meters
/// from the observer; the solver minimizes the weighted sum of squared
/// range residuals in the local tangent plane, starting from the unweighted
/// centroid of observer positions.
///
/// Degeneracy never fails the emitter: near-collinear or co-located
/// geometry falls back to the weighted centroid with the
/// `degenerate_geometry` flag set, and exhausting the iteration budget
/// returns the last iterate flagged `non_converged`.
#[derive(Debug, Clone)]
pub struct MultilaterationSolver {
    pub max_iterations: usize,
    /// Position-update norm below which the solve is considered converged (m)
    pub convergence_threshold_m: f64,
    /// Weight power handed to the centroid fallback
    pub fallback_weight_power: f64,
}

impl MultilaterationSolver {
    pub fn new(max_iterations: usize, convergence_threshold_m: f64, fallback_weight_power: f64) -> Self {
        Self {
            max_iterations,
            convergence_threshold_m,
            fallback_weight_power,
        }
    }

    fn centroid_fallback(
        &self,
        observations: &[Observation],
        model: &PathLossModel,
    ) -> EstimatorResult {
        let position = weighted_position(observations, self.fallback_weight_power);
        EstimatorResult {
            method: EstimatorMethod::Multilateration,
            position,
            residual_error_m: range_rms_residual_m(observations, position, model),
            contributing_count: observations.len(),
            flags: EstimateFlags {
                degenerate_geometry: true,
                ..Default::default()
            },
        }
    }
}

impl PositionEstimator for MultilaterationSolver {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::Multilateration
    }

    fn estimate(&self, set: &ObservationSet, model: &PathLossModel) -> Option<EstimatorResult> {
        let observations = &set.observations;
        if observations.is_empty() {
            return None;
        }
        if observations.len() < 3 {
            tracing::debug!(
                emitter_id = %set.emitter_id,
                count = observations.len(),
                "too few observations for multilateration, using centroid fallback"
            );
            return Some(self.centroid_fallback(observations, model));
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
        // Nearer observations carry more reliable ranges under log-normal
        // shadowing
        let weights: Vec<f64> = ranges.iter().map(|range| 1.0 / range.max(1.0)).collect();

        let mut estimate =
            points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / points.len() as f64;
        let mut flags = EstimateFlags::default();
        let mut converged = false;

        for _ in 0..self.max_iterations {
            let mut normal = Matrix2::zeros();
            let mut gradient = Vector2::zeros();

            for ((point, &range), &weight) in points.iter().zip(&ranges).zip(&weights) {
                let offset = estimate - point;
                let hypothesized = offset.norm();
                if hypothesized < 1e-9 {
                    continue;
                }
                let unit = offset / hypothesized;
                let residual = hypothesized - range;
                normal += weight * unit * unit.transpose();
                gradient += weight * unit * residual;
            }

            let step = match geo::solve_normal_equations(&normal, &gradient) {
                Some(step) => -step,
                None => {
                    tracing::debug!(
                        emitter_id = %set.emitter_id,
                        "ill-conditioned normal equations, using centroid fallback"
                    );
                    return Some(self.centroid_fallback(observations, model));
                }
            };

            estimate += step;
            if step.norm() < self.convergence_threshold_m {
                converged = true;
                break;
            }
        }

        if !converged {
            flags.non_converged = true;
        }

        let position = geo::to_geodetic(estimate, reference);
        Some(EstimatorResult {
            method: EstimatorMethod::Multilateration,
            position,
            residual_error_m: range_rms_residual_m(observations, position, model),
            contributing_count: observations.len(),
            flags,
        })
    }
}
