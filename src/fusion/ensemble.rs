//! Weighted fusion of estimator outputs

use crate::core::{EstimateFlags, EstimatorMethod, EstimatorResult, GeoPoint, MethodUsed};
use crate::utils::config::EnsembleWeights;

/// Fused position before quality assessment
#[derive(Debug, Clone, PartialEq)]
pub struct FusedPosition {
    pub position: GeoPoint,
    pub method_used: MethodUsed,
    pub residual_error_m: f64,
    pub contributing_count: usize,
    pub flags: EstimateFlags,
}

/// Combines whichever estimators survived into a single position.
///
/// Failed or excluded estimators simply drop out; the remaining configured
/// weights are renormalized to sum to one. With the ensemble disabled, the
/// configured primary algorithm's result is passed through unchanged.
#[derive(Debug, Clone)]
pub struct EnsembleFuser {
    pub enabled: bool,
    pub primary: EstimatorMethod,
    pub weights: EnsembleWeights,
}

impl EnsembleFuser {
    pub fn new(enabled: bool, primary: EstimatorMethod, weights: EnsembleWeights) -> Self {
        Self {
            enabled,
            primary,
            weights,
        }
    }

    /// Weights actually applied to the surviving methods; always sums to 1
    /// for a non-empty input
    pub fn applied_weights(&self, results: &[EstimatorResult]) -> Vec<f64> {
        let configured: Vec<f64> = results
            .iter()
            .map(|result| self.weights.weight_for(result.method))
            .collect();
        let total: f64 = configured.iter().sum();
        if total > f64::EPSILON {
            configured.iter().map(|weight| weight / total).collect()
        } else {
            // Every surviving method was configured to zero weight; treat
            // them as equals rather than refusing the emitter
            vec![1.0 / results.len() as f64; results.len()]
        }
    }

    pub fn fuse(&self, results: &[EstimatorResult]) -> Option<FusedPosition> {
        if results.is_empty() {
            return None;
        }

        if !self.enabled {
            let primary = results.iter().find(|result| result.method == self.primary)?;
            return Some(FusedPosition {
                position: primary.position,
                method_used: MethodUsed::Single,
                residual_error_m: primary.residual_error_m,
                contributing_count: primary.contributing_count,
                flags: primary.flags,
            });
        }

        let applied = self.applied_weights(results);
        let mut lat = 0.0;
        let mut lon = 0.0;
        let mut residual = 0.0;
        let mut flags = EstimateFlags::default();
        for (result, &weight) in results.iter().zip(&applied) {
            lat += result.position.lat * weight;
            lon += result.position.lon * weight;
            residual += result.residual_error_m * weight;
            flags = flags.union(result.flags);
        }

        Some(FusedPosition {
            position: GeoPoint::new(lat, lon),
            method_used: MethodUsed::Fused,
            residual_error_m: residual,
            contributing_count: results
                .iter()
                .map(|result| result.contributing_count)
                .max()
                .unwrap_or(0),
            flags,
        })
    }
}
