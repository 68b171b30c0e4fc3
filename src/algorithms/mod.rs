//! Position estimation algorithms

pub mod bayesian;
pub mod centroid;
pub mod geo;
pub mod multilateration;
pub mod path_loss;

pub use bayesian::BayesianEstimator;
pub use centroid::WeightedCentroid;
pub use multilateration::MultilaterationSolver;
pub use path_loss::PathLossModel;

use crate::core::{EstimatorMethod, EstimatorResult, GeoPoint, Observation, ObservationSet};

/// Uniform contract the ensemble fuser operates against.
///
/// `None` means the estimator excluded itself from this emitter; ordinary
/// degeneracy is reported through flags on a returned result, never as a
/// failure.
pub trait PositionEstimator {
    fn method(&self) -> EstimatorMethod;

    fn estimate(&self, set: &ObservationSet, model: &PathLossModel) -> Option<EstimatorResult>;
}

/// Root-mean-square disagreement, in meters, between hypothesized ranges
/// from `position` and the path-loss ranges implied by each observation
pub(crate) fn range_rms_residual_m(
    observations: &[Observation],
    position: GeoPoint,
    model: &PathLossModel,
) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = observations
        .iter()
        .map(|observation| {
            let hypothesized = geo::distance_m(position, observation.observer);
            let modeled = model.distance_m(observation.rssi);
            (hypothesized - modeled).powi(2)
        })
        .sum();
    (sum_sq / observations.len() as f64).sqrt()
}
