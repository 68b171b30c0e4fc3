//! Core types and constants for the geolocation engine

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
