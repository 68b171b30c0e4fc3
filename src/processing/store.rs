//! Ingestion and grouping of raw scan-log records

use std::collections::BTreeMap;

use crate::core::{
    FrequencyBand, GeoPoint, Observation, ObservationSet, RawRecord, RSSI_MAX_DBM, RSSI_MIN_DBM,
};

/// Validates raw records and groups the survivors by emitter identity.
///
/// Malformed records are never an error: they increment a diagnostic
/// counter and are dropped.
#[derive(Debug, Default)]
pub struct ObservationStore {
    sets: BTreeMap<String, Vec<Observation>>,
    malformed: u64,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and file one raw record
    pub fn ingest(&mut self, record: RawRecord) {
        match validate(&record) {
            Ok(()) => {
                let observation = Observation {
                    emitter_id: record.emitter_id.clone(),
                    rssi: record.rssi,
                    timestamp_ms: record.timestamp_ms,
                    observer: GeoPoint::new(record.lat, record.lon),
                    band: record.band.unwrap_or(FrequencyBand::Unknown),
                };
                self.sets.entry(record.emitter_id).or_default().push(observation);
            }
            Err(reason) => {
                self.malformed += 1;
                tracing::debug!(
                    emitter_id = %record.emitter_id,
                    reason,
                    "dropping malformed observation record"
                );
            }
        }
    }

    pub fn ingest_all<I: IntoIterator<Item = RawRecord>>(&mut self, records: I) {
        for record in records {
            self.ingest(record);
        }
    }

    /// Raw records dropped so far
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// Distinct emitters seen so far
    pub fn emitter_count(&self) -> usize {
        self.sets.len()
    }

    /// Consume the store, yielding one set per emitter in emitter-id order
    pub fn into_sets(self) -> Vec<ObservationSet> {
        self.sets
            .into_iter()
            .map(|(emitter_id, observations)| ObservationSet {
                emitter_id,
                observations,
            })
            .collect()
    }
}

fn validate(record: &RawRecord) -> Result<(), &'static str> {
    if record.emitter_id.is_empty() {
        return Err("empty emitter id");
    }
    if !record.rssi.is_finite() || record.rssi < RSSI_MIN_DBM || record.rssi > RSSI_MAX_DBM {
        return Err("rssi outside plausible range");
    }
    if !record.lat.is_finite() || record.lat.abs() > 90.0 {
        return Err("latitude out of range");
    }
    if !record.lon.is_finite() || record.lon.abs() > 180.0 {
        return Err("longitude out of range");
    }
    Ok(())
}
