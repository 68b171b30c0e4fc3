//! Recursive position-track smoothing

use crate::core::Observation;

/// One-dimensional random-walk Kalman filter.
///
/// State is a single coordinate; the motion model assumes the observer
/// drifts slowly relative to GPS noise, so prediction carries the previous
/// estimate forward and inflates the error covariance by the process
/// variance.
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    /// Current state estimate
    pub estimate: f64,
    /// Current error covariance
    pub covariance: f64,
    /// Motion-model noise; lower values trust the model more and smooth harder
    pub process_variance: f64,
    /// Expected measurement (GPS) noise
    pub measurement_variance: f64,
    initialized: bool,
}

impl ScalarKalman {
    pub fn new(process_variance: f64, measurement_variance: f64) -> Self {
        Self {
            estimate: 0.0,
            covariance: 0.0,
            process_variance,
            measurement_variance,
            initialized: false,
        }
    }

    /// Predict forward one step, inflating uncertainty
    pub fn predict(&mut self) -> f64 {
        self.covariance += self.process_variance;
        self.estimate
    }

    /// Correct the prediction with a new raw measurement, returning the
    /// smoothed value. The first measurement initializes the state.
    pub fn update(&mut self, measurement: f64) -> f64 {
        if !self.initialized {
            self.estimate = measurement;
            self.covariance = 1.0;
            self.initialized = true;
            return self.estimate;
        }

        self.predict();
        let gain = self.covariance / (self.covariance + self.measurement_variance);
        self.estimate += gain * (measurement - self.estimate);
        self.covariance *= 1.0 - gain;
        self.estimate
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Smooths the sequence of observer fixes underlying one emitter's
/// observations.
///
/// Latitude and longitude are filtered independently. State never crosses
/// emitter tracks; a fresh pair of filters is created per call.
#[derive(Debug, Clone)]
pub struct TrackSmoother {
    pub enabled: bool,
    pub process_variance: f64,
    pub measurement_variance: f64,
}

impl TrackSmoother {
    pub fn new(enabled: bool, process_variance: f64, measurement_variance: f64) -> Self {
        Self {
            enabled,
            process_variance,
            measurement_variance,
        }
    }

    /// Replace each observation's observer position with the smoothed fix.
    ///
    /// Expects observations ordered by timestamp. Disabled smoothing passes
    /// raw fixes through unchanged.
    pub fn smooth(&self, mut observations: Vec<Observation>) -> Vec<Observation> {
        if !self.enabled || observations.is_empty() {
            return observations;
        }

        let mut lat_filter = ScalarKalman::new(self.process_variance, self.measurement_variance);
        let mut lon_filter = ScalarKalman::new(self.process_variance, self.measurement_variance);

        for observation in &mut observations {
            observation.observer.lat = lat_filter.update(observation.observer.lat);
            observation.observer.lon = lon_filter.update(observation.observer.lon);
        }
        observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FrequencyBand, GeoPoint};

    fn track(fixes: &[(f64, f64)]) -> Vec<Observation> {
        fixes
            .iter()
            .enumerate()
            .map(|(i, &(lat, lon))| Observation {
                emitter_id: "ap-1".to_string(),
                rssi: -60.0,
                timestamp_ms: 1000 + i as u64 * 500,
                observer: GeoPoint::new(lat, lon),
                band: FrequencyBand::Unknown,
            })
            .collect()
    }

    #[test]
    fn test_constant_track_is_preserved() {
        let smoother = TrackSmoother::new(true, 1e-4, 1e-2);
        let smoothed = smoother.smooth(track(&[(47.6, -122.3); 5]));
        for observation in &smoothed {
            assert!((observation.observer.lat - 47.6).abs() < 1e-9);
            assert!((observation.observer.lon + 122.3).abs() < 1e-9);
        }
    }

    #[test]
    fn test_smoothing_attenuates_jitter() {
        // Alternating jitter of +/-0.001 degrees around a fixed point
        let fixes: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                (47.6 + sign * 0.001, -122.3)
            })
            .collect();
        let raw_spread = 0.002;

        let smoother = TrackSmoother::new(true, 1e-6, 1e-2);
        let smoothed = smoother.smooth(track(&fixes));

        // Skip the warm-up sample; the filter output must swing less than raw
        let lats: Vec<f64> = smoothed[5..].iter().map(|o| o.observer.lat).collect();
        let max = lats.iter().cloned().fold(f64::MIN, f64::max);
        let min = lats.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max - min < raw_spread * 0.5);
    }

    #[test]
    fn test_disabled_smoother_passes_through() {
        let smoother = TrackSmoother::new(false, 1e-4, 1e-2);
        let original = track(&[(47.6, -122.3), (47.7, -122.4)]);
        let result = smoother.smooth(original.clone());
        assert_eq!(result, original);
    }

    #[test]
    fn test_first_measurement_initializes_state() {
        let mut filter = ScalarKalman::new(1e-4, 1e-2);
        assert!(!filter.is_initialized());
        let first = filter.update(12.5);
        assert_eq!(first, 12.5);
        assert!(filter.is_initialized());
    }

    #[test]
    fn test_filter_converges_toward_constant_signal() {
        let mut filter = ScalarKalman::new(1e-6, 1e-2);
        filter.update(0.0);
        let mut last = 0.0;
        for _ in 0..50 {
            last = filter.update(1.0);
        }
        assert!((last - 1.0).abs() < 0.05);
    }
}
