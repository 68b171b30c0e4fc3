//! Batch geolocation pipeline

use rayon::prelude::*;

use crate::algorithms::{
    BayesianEstimator, MultilaterationSolver, PathLossModel, PositionEstimator, WeightedCentroid,
};
use crate::core::{
    BatchReport, EmitterReport, EstimatorResult, GeoPoint, LocationOutcome, NoEstimateReason,
    ObservationSet, RawRecord,
};
use crate::fusion::{EnsembleFuser, QualityAssessor};
use crate::processing::{DensityClusterer, ObservationStore, TrackSmoother};
use crate::utils::config::{ConfigError, EngineConfig};

/// The emitter geolocation engine.
///
/// Construction validates the configuration; everything afterwards is
/// infallible at the batch level. Emitters are processed independently —
/// `process_emitter` is a pure function of the set and the engine's
/// read-only configuration, so batches fan out over a worker pool with no
/// shared mutable state.
pub struct GeolocationEngine {
    config: EngineConfig,
    path_loss: PathLossModel,
    smoother: TrackSmoother,
    clusterer: DensityClusterer,
    multilateration: MultilaterationSolver,
    centroid: WeightedCentroid,
    bayesian: BayesianEstimator,
    fuser: EnsembleFuser,
    assessor: QualityAssessor,
}

impl GeolocationEngine {
    /// Validate the configuration and assemble the pipeline stages.
    /// A configuration fault aborts here, before any record is touched.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let path_loss = PathLossModel::new(
            config.path_loss_reference_rssi,
            config.path_loss_exponent,
            config.environment_tag.clone(),
        );
        let smoother = TrackSmoother::new(
            config.kalman_enable,
            config.kalman_process_variance,
            config.kalman_measurement_variance,
        );
        let clusterer = DensityClusterer::new(config.outlier_eps_m, config.outlier_min_samples);
        let multilateration = MultilaterationSolver::new(
            config.max_iterations,
            config.convergence_threshold_m,
            config.centroid_weight_power,
        );
        let centroid = WeightedCentroid::new(config.centroid_weight_power);
        let bayesian =
            BayesianEstimator::new(config.max_iterations, config.convergence_threshold_m);
        let fuser = EnsembleFuser::new(
            config.enable_ensemble,
            config.primary_algorithm,
            config.ensemble_weights,
        );
        let assessor = QualityAssessor::new(
            config.min_points_for_confidence,
            config.low_confidence_threshold,
        );

        Ok(Self {
            config,
            path_loss,
            smoother,
            clusterer,
            multilateration,
            centroid,
            bayesian,
            fuser,
            assessor,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn path_loss(&self) -> &PathLossModel {
        &self.path_loss
    }

    /// Ingest raw records and locate every emitter present in them.
    ///
    /// Always completes: each emitter yields either an estimate or an
    /// explicit no-estimate report, in emitter-id order.
    pub fn run<I: IntoIterator<Item = RawRecord>>(&self, records: I) -> BatchReport {
        let mut store = ObservationStore::new();
        store.ingest_all(records);
        let malformed_records = store.malformed_count();
        let sets = store.into_sets();

        tracing::debug!(
            emitters = sets.len(),
            malformed = malformed_records,
            "starting batch run"
        );

        let reports: Vec<EmitterReport> = sets
            .into_par_iter()
            .map(|set| self.process_emitter(set))
            .collect();

        BatchReport {
            reports,
            malformed_records,
        }
    }

    /// Run the full pipeline for a single emitter:
    /// smooth -> reject outliers -> gate -> estimate -> fuse -> assess.
    pub fn process_emitter(&self, set: ObservationSet) -> EmitterReport {
        let emitter_id = set.emitter_id;
        let input_count = set.observations.len();

        let mut observations = set.observations;
        observations.sort_by_key(|observation| observation.timestamp_ms);
        let observations = self.smoother.smooth(observations);

        let positions: Vec<GeoPoint> = observations
            .iter()
            .map(|observation| observation.observer)
            .collect();
        let assignment = self.clusterer.assign(&positions);
        let noise_count = assignment.noise_count();

        let kept: Vec<_> = observations
            .into_iter()
            .zip(&assignment.labels)
            .filter(|(_, label)| !label.is_noise())
            .map(|(observation, _)| observation)
            .collect();

        if kept.len() < self.config.min_points_for_confidence {
            tracing::debug!(
                emitter_id = %emitter_id,
                usable = kept.len(),
                required = self.config.min_points_for_confidence,
                "insufficient usable observations"
            );
            return EmitterReport {
                emitter_id,
                input_count,
                noise_count,
                outcome: LocationOutcome::NoEstimate {
                    reason: NoEstimateReason::InsufficientData,
                },
            };
        }

        let set = ObservationSet {
            emitter_id: emitter_id.clone(),
            observations: kept,
        };
        let results = self.run_estimators(&set);

        let outcome = match self.fuser.fuse(&results) {
            Some(fused) => {
                let estimate = self.assessor.assess(
                    &emitter_id,
                    &fused,
                    &results,
                    &set.observations,
                    &self.path_loss,
                );
                LocationOutcome::Estimate(estimate)
            }
            None => {
                tracing::warn!(emitter_id = %emitter_id, "no estimator produced a usable result");
                LocationOutcome::NoEstimate {
                    reason: NoEstimateReason::AllEstimatorsFailed,
                }
            }
        };

        EmitterReport {
            emitter_id,
            input_count,
            noise_count,
            outcome,
        }
    }

    /// Run the enabled estimators in a fixed order. The weighted centroid
    /// is always a member: it cannot fail for a non-empty set and anchors
    /// the ensemble when the iterative solvers drop out.
    fn run_estimators(&self, set: &ObservationSet) -> Vec<EstimatorResult> {
        let mut results = Vec::with_capacity(3);
        if self.config.enable_multilateration {
            if let Some(result) = self.multilateration.estimate(set, &self.path_loss) {
                results.push(result);
            }
        }
        if let Some(result) = self.centroid.estimate(set, &self.path_loss) {
            results.push(result);
        }
        if self.config.enable_bayesian {
            if let Some(result) = self.bayesian.estimate(set, &self.path_loss) {
                results.push(result);
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::geo;
    use crate::core::{EstimatorMethod, MethodUsed};
    use nalgebra::Vector2;

    const REFERENCE: GeoPoint = GeoPoint { lat: 47.6, lon: -122.3 };

    /// A permissive configuration for small synthetic fixtures: smoothing
    /// off so positions stay exact, clustering loose enough to keep
    /// everything that is not a deliberate outlier.
    fn test_config() -> EngineConfig {
        EngineConfig {
            kalman_enable: false,
            outlier_eps_m: 200.0,
            outlier_min_samples: 2,
            min_points_for_confidence: 3,
            ..Default::default()
        }
    }

    /// Records placed in local meters with RSSI generated exactly from the
    /// engine's path-loss calibration for an emitter at `truth`
    fn zero_noise_records(observer_xy: &[(f64, f64)], truth: (f64, f64)) -> Vec<RawRecord> {
        let model = PathLossModel::new(-40.0, 2.7, "outdoor".to_string());
        let truth = Vector2::new(truth.0, truth.1);
        observer_xy
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let local = Vector2::new(x, y);
                let observer = geo::to_geodetic(local, REFERENCE);
                RawRecord {
                    emitter_id: "ap-1".to_string(),
                    rssi: model.expected_rssi((truth - local).norm()),
                    timestamp_ms: 1000 + i as u64 * 100,
                    lat: observer.lat,
                    lon: observer.lon,
                    band: None,
                }
            })
            .collect()
    }

    const SQUARE: [(f64, f64); 4] = [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (80.0, 80.0)];

    #[test]
    fn test_minimum_data_gate() {
        let engine = GeolocationEngine::new(test_config()).unwrap();
        let records = zero_noise_records(&[(0.0, 0.0), (50.0, 0.0)], (25.0, 10.0));

        let report = engine.run(records);
        assert_eq!(report.reports.len(), 1);
        assert_eq!(
            report.reports[0].outcome,
            LocationOutcome::NoEstimate {
                reason: NoEstimateReason::InsufficientData
            }
        );
    }

    #[test]
    fn test_single_method_zero_noise_recovery() {
        let config = EngineConfig {
            enable_ensemble: false,
            primary_algorithm: EstimatorMethod::Multilateration,
            ..test_config()
        };
        let engine = GeolocationEngine::new(config).unwrap();
        let report = engine.run(zero_noise_records(&SQUARE, (30.0, 40.0)));

        let estimate = match &report.reports[0].outcome {
            LocationOutcome::Estimate(estimate) => estimate,
            other => panic!("expected an estimate, got {other:?}"),
        };
        assert_eq!(estimate.method_used, MethodUsed::Single);

        let truth = geo::to_geodetic(Vector2::new(30.0, 40.0), REFERENCE);
        let error = geo::distance_m(GeoPoint::new(estimate.lat, estimate.lon), truth);
        assert!(error < 2.0, "position error {error} m");
        assert!(estimate.residual_error_m < 0.5);
    }

    #[test]
    fn test_fused_estimate_lands_near_truth() {
        let engine = GeolocationEngine::new(test_config()).unwrap();
        let report = engine.run(zero_noise_records(&SQUARE, (30.0, 40.0)));

        let estimate = match &report.reports[0].outcome {
            LocationOutcome::Estimate(estimate) => estimate,
            other => panic!("expected an estimate, got {other:?}"),
        };
        assert_eq!(estimate.method_used, MethodUsed::Fused);
        assert_eq!(estimate.contributing_observation_count, 4);

        // The centroid member pulls the fused position toward the observer
        // cloud, so the tolerance is looser than the single-solver case
        let truth = geo::to_geodetic(Vector2::new(30.0, 40.0), REFERENCE);
        let error = geo::distance_m(GeoPoint::new(estimate.lat, estimate.lon), truth);
        assert!(error < 60.0, "position error {error} m");
        assert!(estimate.confidence > 0.0);
    }

    #[test]
    fn test_outlier_immunity() {
        let config = EngineConfig {
            outlier_eps_m: 100.0,
            ..test_config()
        };

        let clustered = zero_noise_records(&SQUARE, (30.0, 40.0));
        // Same four observations plus one whose observer sits 500 m away
        let mut with_outlier = clustered.clone();
        let offset = geo::to_geodetic(Vector2::new(500.0, 0.0), REFERENCE);
        with_outlier.push(RawRecord {
            emitter_id: "ap-1".to_string(),
            rssi: -75.0,
            timestamp_ms: 2000,
            lat: offset.lat,
            lon: offset.lon,
            band: None,
        });

        let engine = GeolocationEngine::new(config).unwrap();
        let baseline = engine.run(clustered);
        let contaminated = engine.run(with_outlier);

        assert_eq!(contaminated.reports[0].noise_count, 1);
        match (
            &baseline.reports[0].outcome,
            &contaminated.reports[0].outcome,
        ) {
            (LocationOutcome::Estimate(a), LocationOutcome::Estimate(b)) => {
                assert_eq!(a.lat, b.lat);
                assert_eq!(a.lon, b.lon);
                assert_eq!(a.confidence, b.confidence);
            }
            other => panic!("expected two estimates, got {other:?}"),
        }
    }

    #[test]
    fn test_determinism_across_runs() {
        let mut records = zero_noise_records(&SQUARE, (30.0, 40.0));
        for (i, record) in zero_noise_records(&SQUARE, (10.0, 70.0)).iter().enumerate() {
            records.push(RawRecord {
                emitter_id: "ap-2".to_string(),
                timestamp_ms: 5000 + i as u64 * 100,
                ..record.clone()
            });
        }
        records.push(RawRecord {
            emitter_id: "ap-3".to_string(),
            rssi: -60.0,
            timestamp_ms: 9000,
            lat: 47.61,
            lon: -122.31,
            band: None,
        });

        let engine = GeolocationEngine::new(test_config()).unwrap();
        let first = engine.run(records.clone());
        let second = engine.run(records);
        assert_eq!(first, second);
    }

    #[test]
    fn test_reports_are_in_emitter_id_order() {
        let mut records = Vec::new();
        for emitter_id in ["zz-ap", "aa-ap", "mm-ap"] {
            for record in zero_noise_records(&SQUARE, (30.0, 40.0)) {
                records.push(RawRecord {
                    emitter_id: emitter_id.to_string(),
                    ..record
                });
            }
        }
        let engine = GeolocationEngine::new(test_config()).unwrap();
        let report = engine.run(records);
        let ids: Vec<&str> = report
            .reports
            .iter()
            .map(|r| r.emitter_id.as_str())
            .collect();
        assert_eq!(ids, vec!["aa-ap", "mm-ap", "zz-ap"]);
    }

    #[test]
    fn test_malformed_records_counted_not_fatal() {
        let mut records = zero_noise_records(&SQUARE, (30.0, 40.0));
        records.push(RawRecord {
            emitter_id: "ap-1".to_string(),
            rssi: 40.0, // implausible
            timestamp_ms: 3000,
            lat: 47.6,
            lon: -122.3,
            band: None,
        });

        let engine = GeolocationEngine::new(test_config()).unwrap();
        let report = engine.run(records);
        assert_eq!(report.malformed_records, 1);
        assert!(matches!(
            report.reports[0].outcome,
            LocationOutcome::Estimate(_)
        ));
    }

    #[test]
    fn test_disabled_primary_yields_all_estimators_failed() {
        let config = EngineConfig {
            enable_ensemble: false,
            enable_bayesian: false,
            primary_algorithm: EstimatorMethod::Bayesian,
            ..test_config()
        };
        let engine = GeolocationEngine::new(config).unwrap();
        let report = engine.run(zero_noise_records(&SQUARE, (30.0, 40.0)));
        assert_eq!(
            report.reports[0].outcome,
            LocationOutcome::NoEstimate {
                reason: NoEstimateReason::AllEstimatorsFailed
            }
        );
    }

    #[test]
    fn test_confidence_monotonic_in_agreeing_observations() {
        let few = zero_noise_records(&SQUARE, (30.0, 40.0));
        let many = zero_noise_records(
            &[
                (0.0, 0.0),
                (100.0, 0.0),
                (0.0, 100.0),
                (80.0, 80.0),
                (50.0, -20.0),
                (-30.0, 60.0),
                (110.0, 50.0),
                (40.0, 110.0),
            ],
            (30.0, 40.0),
        );

        let engine = GeolocationEngine::new(test_config()).unwrap();
        let confidence = |records: Vec<RawRecord>| match &engine.run(records).reports[0].outcome {
            LocationOutcome::Estimate(estimate) => estimate.confidence,
            other => panic!("expected an estimate, got {other:?}"),
        };

        assert!(confidence(many) >= confidence(few));
    }

    #[test]
    fn test_invalid_config_rejected_before_processing() {
        let config = EngineConfig {
            path_loss_exponent: -2.7,
            ..Default::default()
        };
        assert!(GeolocationEngine::new(config).is_err());
    }

    #[test]
    fn test_smoothing_enabled_pipeline_still_estimates() {
        let config = EngineConfig {
            kalman_enable: true,
            ..test_config()
        };
        let engine = GeolocationEngine::new(config).unwrap();
        let report = engine.run(zero_noise_records(&SQUARE, (30.0, 40.0)));
        assert!(matches!(
            report.reports[0].outcome,
            LocationOutcome::Estimate(_)
        ));
    }
}
