//! Core data types for the geolocation engine

use serde::{Deserialize, Serialize};

/// Geodetic coordinate pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Radio frequency band of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyBand {
    Band24Ghz,
    Band5Ghz,
    Band6Ghz,
    #[default]
    Unknown,
}

/// Raw observation row as supplied by a scan-log reader.
///
/// Unvalidated; the observation store decides whether a row becomes an
/// [`Observation`] or a malformed-input statistic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Emitter identity (BSSID or equivalent)
    pub emitter_id: String,
    /// Received signal strength (dBm)
    pub rssi: f64,
    /// Capture time (milliseconds since epoch)
    pub timestamp_ms: u64,
    /// Observer latitude at capture time (decimal degrees)
    pub lat: f64,
    /// Observer longitude at capture time (decimal degrees)
    pub lon: f64,
    /// Frequency band, when the capture tool reports one
    #[serde(default)]
    pub band: Option<FrequencyBand>,
}

/// A validated, immutable signal observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub emitter_id: String,
    /// Received signal strength (dBm)
    pub rssi: f64,
    /// Capture time (milliseconds since epoch)
    pub timestamp_ms: u64,
    /// Observer position at capture time
    pub observer: GeoPoint,
    pub band: FrequencyBand,
}

/// All observations of one emitter within an analysis window.
///
/// Owned exclusively by a single pipeline run; insertion order carries no
/// meaning.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    pub emitter_id: String,
    pub observations: Vec<Observation>,
}

/// Position estimation algorithm identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorMethod {
    Multilateration,
    WeightedCentroid,
    Bayesian,
}

/// Quality flags accumulated along the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EstimateFlags {
    /// Confidence fell below the configured threshold
    pub low_confidence: bool,
    /// Iterative solver hit its iteration cap before converging
    pub non_converged: bool,
    /// Observer geometry too collinear or co-located for a reliable solve
    pub degenerate_geometry: bool,
}

impl EstimateFlags {
    /// Combine flags from two sources
    pub fn union(self, other: Self) -> Self {
        Self {
            low_confidence: self.low_confidence || other.low_confidence,
            non_converged: self.non_converged || other.non_converged,
            degenerate_geometry: self.degenerate_geometry || other.degenerate_geometry,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.low_confidence || self.non_converged || self.degenerate_geometry)
    }
}

/// Output of a single estimator for a single emitter
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorResult {
    pub method: EstimatorMethod,
    pub position: GeoPoint,
    /// Residual error in meters; interpretation is method-specific
    /// (geometric range residual or posterior 1-sigma radius)
    pub residual_error_m: f64,
    pub contributing_count: usize,
    pub flags: EstimateFlags,
}

/// How the final position was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodUsed {
    /// Weighted combination of several estimators
    Fused,
    /// A single configured estimator
    Single,
    /// No estimator produced a usable result
    None,
}

/// Final per-emitter position artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub emitter_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Confidence score in `[0, 1]`
    pub confidence: f64,
    pub method_used: MethodUsed,
    pub contributing_observation_count: usize,
    pub residual_error_m: f64,
    pub flags: EstimateFlags,
}

/// Why an emitter yielded no estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoEstimateReason {
    /// Fewer usable observations than `min_points_for_confidence`
    InsufficientData,
    /// Every enabled estimator failed or was excluded
    AllEstimatorsFailed,
}

/// Outcome of one emitter's pipeline run: a position or an explicit refusal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationOutcome {
    Estimate(PositionEstimate),
    NoEstimate { reason: NoEstimateReason },
}

/// Per-emitter pipeline report with diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterReport {
    pub emitter_id: String,
    /// Observations ingested for this emitter before any filtering
    pub input_count: usize,
    /// Observations labeled noise by the outlier rejector
    pub noise_count: usize,
    pub outcome: LocationOutcome,
}

/// Result of a whole batch run: one report per emitter seen in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Reports in emitter-id order
    pub reports: Vec<EmitterReport>,
    /// Raw records dropped during ingestion
    pub malformed_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_union() {
        let a = EstimateFlags {
            non_converged: true,
            ..Default::default()
        };
        let b = EstimateFlags {
            degenerate_geometry: true,
            ..Default::default()
        };
        let merged = a.union(b);
        assert!(merged.non_converged);
        assert!(merged.degenerate_geometry);
        assert!(!merged.low_confidence);
        assert!(EstimateFlags::default().is_empty());
    }

    #[test]
    fn test_raw_record_deserialization_defaults_band() {
        let json = r#"{
            "emitter_id": "aa:bb:cc:dd:ee:ff",
            "rssi": -62.5,
            "timestamp_ms": 1700000000000,
            "lat": 47.6097,
            "lon": -122.3331
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.emitter_id, "aa:bb:cc:dd:ee:ff");
        assert!(record.band.is_none());
    }

    #[test]
    fn test_outcome_serialization_tags_status() {
        let outcome = LocationOutcome::NoEstimate {
            reason: NoEstimateReason::InsufficientData,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("no_estimate"));
        assert!(json.contains("insufficient_data"));
    }
}
