//! RF Emitter Geolocation Engine
//!
//! Estimates the physical location of fixed wireless emitters from
//! time-stamped signal-strength observations collected by moving
//! observers. The pipeline smooths observer tracks, rejects sporadic
//! positions, runs several independent range-based estimators, fuses
//! their outputs, and scores the result's confidence.

pub mod algorithms;
pub mod core;
pub mod engine;
pub mod fusion;
pub mod processing;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    BatchReport, EmitterReport, EstimateFlags, EstimatorMethod, EstimatorResult, FrequencyBand,
    GeoPoint, LocationOutcome, MethodUsed, NoEstimateReason, Observation, ObservationSet,
    PositionEstimate, RawRecord,
};
pub use algorithms::{
    BayesianEstimator, MultilaterationSolver, PathLossModel, PositionEstimator, WeightedCentroid,
};
pub use engine::GeolocationEngine;
pub use fusion::{EnsembleFuser, QualityAssessor};
pub use processing::{DensityClusterer, ObservationStore, TrackSmoother};
pub use utils::config::{ConfigError, EngineConfig, EnsembleWeights};
