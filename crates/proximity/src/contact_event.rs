//! Persisted contact-event records and their store contract

use async_trait::async_trait;
use identity::{BroadcastIdentifier, SIGNATURE_SIZE};
use serde::{Deserialize, Serialize};
use shared::PersistenceResult;
use tokio::sync::RwLock;

/// All samples collected from one remote cryptogram.
///
/// RSSI values and their timestamps are parallel arrays ordered by
/// timestamp; `timestamp` is the earliest sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEvent {
    /// Remote cryptogram bytes, the key of the record
    pub sonar_id: Vec<u8>,
    pub rssi_values: Vec<i16>,
    /// Epoch milliseconds
    pub rssi_timestamps: Vec<i64>,
    /// First-seen, epoch milliseconds
    pub timestamp: i64,
    /// Nominal duration in seconds
    pub duration: i64,
    pub tx_power_in_protocol: i8,
    pub tx_power_advertised: i8,
    pub transmission_time: i32,
    pub country_code: [u8; 2],
    pub hmac_signature: [u8; SIGNATURE_SIZE],
}

impl ContactEvent {
    /// A single-sample event from one reading
    pub fn from_reading(
        identifier: &BroadcastIdentifier,
        rssi: i16,
        timestamp_millis: i64,
        tx_power_advertised: i8,
        duration: i64,
    ) -> Self {
        Self {
            sonar_id: identifier.cryptogram.as_bytes().to_vec(),
            rssi_values: vec![rssi],
            rssi_timestamps: vec![timestamp_millis],
            timestamp: timestamp_millis,
            duration,
            tx_power_in_protocol: identifier.tx_power,
            tx_power_advertised,
            transmission_time: identifier.transmission_time,
            country_code: identifier.country_code,
            hmac_signature: identifier.hmac_signature,
        }
    }

    /// `(rssi, epoch millis)` pairs in timestamp order
    pub fn samples(&self) -> impl Iterator<Item = (i16, i64)> + '_ {
        self.rssi_values
            .iter()
            .copied()
            .zip(self.rssi_timestamps.iter().copied())
    }

    /// Fold a newer update for the same remote identity into this record.
    ///
    /// Samples are merged and re-sorted by timestamp, first-seen stays the
    /// earliest sample, and duration takes the update's nominal value.
    pub fn merge(&mut self, update: ContactEvent) {
        let mut samples: Vec<(i16, i64)> = self.samples().chain(update.samples()).collect();
        samples.sort_by_key(|&(_, timestamp)| timestamp);

        self.rssi_values = samples.iter().map(|&(rssi, _)| rssi).collect();
        self.rssi_timestamps = samples.iter().map(|&(_, timestamp)| timestamp).collect();
        self.timestamp = self.timestamp.min(update.timestamp);
        self.duration = update.duration;
        self.tx_power_in_protocol = update.tx_power_in_protocol;
        self.tx_power_advertised = update.tx_power_advertised;
        self.transmission_time = update.transmission_time;
        self.country_code = update.country_code;
        self.hmac_signature = update.hmac_signature;
    }
}

/// Durable home of contact events, keyed by `sonar_id`
#[async_trait]
pub trait ContactEventStore: Send + Sync {
    /// Insert, or merge into the record with the same `sonar_id`
    async fn create_or_update(&self, event: ContactEvent) -> PersistenceResult<()>;

    async fn get_all(&self) -> PersistenceResult<Vec<ContactEvent>>;

    async fn clear(&self) -> PersistenceResult<()>;
}

#[derive(Default)]
pub struct InMemoryContactEventStore {
    events: RwLock<Vec<ContactEvent>>,
}

impl InMemoryContactEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactEventStore for InMemoryContactEventStore {
    async fn create_or_update(&self, event: ContactEvent) -> PersistenceResult<()> {
        let mut events = self.events.write().await;
        match events.iter_mut().find(|e| e.sonar_id == event.sonar_id) {
            Some(existing) => existing.merge(event),
            None => events.push(event),
        }
        Ok(())
    }

    async fn get_all(&self) -> PersistenceResult<Vec<ContactEvent>> {
        Ok(self.events.read().await.clone())
    }

    async fn clear(&self) -> PersistenceResult<()> {
        self.events.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity::Cryptogram;

    fn identifier(fill: u8) -> BroadcastIdentifier {
        BroadcastIdentifier {
            country_code: *b"GB",
            cryptogram: Cryptogram::from_bytes(&[fill; Cryptogram::SIZE]).unwrap(),
            tx_power: -4,
            transmission_time: 120,
            hmac_signature: [fill; SIGNATURE_SIZE],
        }
    }

    #[test]
    fn test_merge_orders_samples_and_keeps_first_seen() {
        let mut event = ContactEvent::from_reading(&identifier(1), -50, 10_000, 7, 60);
        event.merge(ContactEvent::from_reading(&identifier(1), -60, 4_000, 7, 60));
        event.merge(ContactEvent::from_reading(&identifier(1), -55, 12_000, 7, 60));

        assert_eq!(event.rssi_timestamps, vec![4_000, 10_000, 12_000]);
        assert_eq!(event.rssi_values, vec![-60, -50, -55]);
        assert_eq!(event.timestamp, 4_000);
        assert_eq!(event.duration, 60);
    }

    #[tokio::test]
    async fn test_one_record_per_cryptogram() {
        let store = InMemoryContactEventStore::new();

        store
            .create_or_update(ContactEvent::from_reading(&identifier(1), -50, 1_000, 0, 60))
            .await
            .unwrap();
        store
            .create_or_update(ContactEvent::from_reading(&identifier(1), -51, 2_000, 0, 60))
            .await
            .unwrap();
        store
            .create_or_update(ContactEvent::from_reading(&identifier(2), -70, 1_500, 0, 60))
            .await
            .unwrap();

        let events = store.get_all().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].rssi_values, vec![-50, -51]);

        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let event = ContactEvent::from_reading(&identifier(3), -40, 1_000, 2, 60);
        let json = serde_json::to_value(&event).unwrap();

        assert!(json.get("sonarId").is_some());
        assert!(json.get("rssiTimestamps").is_some());
        assert_eq!(json["txPowerInProtocol"], -4);

        let back: ContactEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
