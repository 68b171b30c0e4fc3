//! Physical constants and plausibility bounds

/// Weakest RSSI considered plausible for a received frame (dBm)
pub const RSSI_MIN_DBM: f64 = -100.0;

/// Strongest RSSI considered plausible for a received frame (dBm)
pub const RSSI_MAX_DBM: f64 = 0.0;

/// Meters per degree of latitude (roughly constant)
pub const METERS_PER_DEG_LAT: f64 = 111_132.0;

/// Meters per degree of longitude at the equator
pub const METERS_PER_DEG_LON_EQUATOR: f64 = 111_320.0;

/// Nominal standard deviation of RSSI under log-normal shadowing (dB),
/// used as the floor for empirical noise estimates
pub const NOMINAL_RSSI_SIGMA_DB: f64 = 2.0;
