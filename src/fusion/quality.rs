//! Confidence scoring and result classification

use crate::algorithms::{geo, PathLossModel};
use crate::core::{EstimatorResult, Observation, PositionEstimate};
use crate::fusion::ensemble::FusedPosition;

/// Estimator disagreement, in meters, at which the agreement factor
/// reaches zero
const AGREEMENT_SCALE_M: f64 = 100.0;

/// Scores the fused result and stamps the final flags.
///
/// Confidence blends three factors: observation count relative to the
/// configured minimum (saturating), agreement among the estimators that
/// fed the ensemble, and the best residual against the path-loss noise
/// floor at the observed signal level.
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    pub min_points_for_confidence: usize,
    pub low_confidence_threshold: f64,
}

impl QualityAssessor {
    pub fn new(min_points_for_confidence: usize, low_confidence_threshold: f64) -> Self {
        Self {
            min_points_for_confidence,
            low_confidence_threshold,
        }
    }

    /// Build the terminal [`PositionEstimate`] for one emitter
    pub fn assess(
        &self,
        emitter_id: &str,
        fused: &FusedPosition,
        members: &[EstimatorResult],
        observations: &[Observation],
        model: &PathLossModel,
    ) -> PositionEstimate {
        let count_factor = self.count_factor(fused.contributing_count);
        let agreement_factor = agreement_factor(members);
        let residual_factor = residual_factor(members, observations, model);

        let confidence =
            (0.4 * count_factor + 0.3 * agreement_factor + 0.3 * residual_factor).clamp(0.0, 1.0);

        let mut flags = fused.flags;
        if confidence < self.low_confidence_threshold {
            flags.low_confidence = true;
        }

        PositionEstimate {
            emitter_id: emitter_id.to_string(),
            lat: fused.position.lat,
            lon: fused.position.lon,
            confidence,
            method_used: fused.method_used,
            contributing_observation_count: fused.contributing_count,
            residual_error_m: fused.residual_error_m,
            flags,
        }
    }

    /// Saturates at twice the configured minimum observation count
    fn count_factor(&self, count: usize) -> f64 {
        let saturation = (2 * self.min_points_for_confidence) as f64;
        (count as f64 / saturation).min(1.0)
    }
}

/// One minus the normalized worst pairwise disagreement between estimator
/// positions; a single member scores full agreement
fn agreement_factor(members: &[EstimatorResult]) -> f64 {
    let mut max_spread: f64 = 0.0;
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            max_spread = max_spread.max(geo::distance_m(members[i].position, members[j].position));
        }
    }
    1.0 - (max_spread / AGREEMENT_SCALE_M).min(1.0)
}

/// Best member residual measured against the range noise floor at the
/// median observed RSSI
fn residual_factor(
    members: &[EstimatorResult],
    observations: &[Observation],
    model: &PathLossModel,
) -> f64 {
    let best_residual = members
        .iter()
        .map(|member| member.residual_error_m)
        .fold(f64::INFINITY, f64::min);
    if !best_residual.is_finite() {
        return 0.0;
    }
    let noise_floor = model.noise_floor_m(median_rssi(observations)).max(1.0);
    noise_floor / (noise_floor + best_residual)
}

fn median_rssi(observations: &[Observation]) -> f64 {
    if observations.is_empty() {
        return -70.0;
    }
    let mut values: Vec<f64> = observations.iter().map(|o| o.rssi).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values[values.len() / 2]
}
