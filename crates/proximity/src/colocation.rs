//! Upload payloads built from stored contact events

use crate::contact_event::{ContactEvent, ContactEventStore};
use crate::error::ProximityResult;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::info;

/// Whole-second gaps between consecutive sample timestamps.
///
/// The first gap is always zero. Produced lazily from the stored epoch
/// milliseconds and restartable by cloning.
#[derive(Debug, Clone)]
pub struct Intervals<'a> {
    timestamps: &'a [i64],
    index: usize,
}

pub fn timestamps_to_intervals(timestamps: &[i64]) -> Intervals<'_> {
    Intervals {
        timestamps,
        index: 0,
    }
}

impl Iterator for Intervals<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = *self.timestamps.get(self.index)?;
        let interval = match self.index {
            0 => 0,
            i => (current - self.timestamps[i - 1]) / 1000,
        };
        self.index += 1;
        Some(interval)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.timestamps.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Intervals<'_> {}

impl FusedIterator for Intervals<'_> {}

/// One contact event as the backend expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoLocationEvent {
    pub encrypted_remote_contact_id: String,
    pub rssi_values: String,
    pub rssi_intervals: Vec<i64>,
    pub timestamp: String,
    pub duration: i64,
    pub tx_power_in_protocol: i8,
    pub tx_power_advertised: i8,
    pub hmac_signature: String,
    pub country_code: i16,
    pub transmission_time: i32,
}

impl From<&ContactEvent> for CoLocationEvent {
    fn from(event: &ContactEvent) -> Self {
        // One wrapping signed byte per sample
        let rssi_bytes: Vec<u8> = event.rssi_values.iter().map(|rssi| *rssi as i8 as u8).collect();

        Self {
            encrypted_remote_contact_id: STANDARD.encode(&event.sonar_id),
            rssi_values: STANDARD.encode(rssi_bytes),
            rssi_intervals: timestamps_to_intervals(&event.rssi_timestamps).collect(),
            timestamp: utc_iso(event.timestamp),
            duration: event.duration,
            tx_power_in_protocol: event.tx_power_in_protocol,
            tx_power_advertised: event.tx_power_advertised,
            hmac_signature: STANDARD.encode(event.hmac_signature),
            country_code: i16::from_be_bytes(event.country_code),
            transmission_time: event.transmission_time,
        }
    }
}

/// Body of a proximity upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoLocationData {
    pub sonar_id: String,
    pub symptoms_timestamp: String,
    pub symptoms: Vec<String>,
    pub contact_events: Vec<CoLocationEvent>,
}

pub struct CoLocationDataProvider {
    store: Arc<dyn ContactEventStore>,
}

impl CoLocationDataProvider {
    pub fn new(store: Arc<dyn ContactEventStore>) -> Self {
        Self { store }
    }

    pub async fn get_events(&self) -> ProximityResult<Vec<CoLocationEvent>> {
        let events = self.store.get_all().await?;
        Ok(events.iter().map(CoLocationEvent::from).collect())
    }

    /// Delete every stored contact event, typically after a successful upload
    pub async fn clear_data(&self) -> ProximityResult<()> {
        self.store.clear().await?;
        info!("Cleared stored contact events");
        Ok(())
    }
}

fn utc_iso(epoch_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_millis)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}
