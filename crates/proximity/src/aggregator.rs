//! Contact Event Aggregator
//!
//! Readings from all concurrent radio sessions funnel through one queue into
//! one background writer, so updates to a single record never interleave.

use crate::contact_event::{ContactEvent, ContactEventStore};
use chrono::{DateTime, Utc};
use identity::BroadcastIdentifier;
use shared::config::ContactEventConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// One RSSI sample against a decoded remote identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactReading {
    pub identifier: BroadcastIdentifier,
    pub rssi: i16,
    pub timestamp: DateTime<Utc>,
    pub tx_power_advertised: i8,
}

enum Command {
    Record(ContactReading),
    Flush(oneshot::Sender<()>),
}

/// Best-effort writer of contact events
#[derive(Clone)]
pub struct SaveContactWorker {
    queue: mpsc::UnboundedSender<Command>,
}

impl SaveContactWorker {
    /// Spawn the background writer on the current runtime.
    ///
    /// The writer exits once every handle to the worker is dropped.
    pub fn start(store: Arc<dyn ContactEventStore>, config: &ContactEventConfig) -> Self {
        let (queue, commands) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store, config.nominal_duration_secs, commands));
        Self { queue }
    }

    /// Queue a reading for persistence. Never blocks and never fails.
    pub fn record(&self, identifier: BroadcastIdentifier, rssi: i16, timestamp: DateTime<Utc>, tx_power_advertised: i8) {
        let reading = ContactReading {
            identifier,
            rssi,
            timestamp,
            tx_power_advertised,
        };

        if self.queue.send(Command::Record(reading)).is_err() {
            error!("Contact event writer has stopped, dropping reading");
        }
    }

    /// Wait until every reading queued before this call has been written
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        if self.queue.send(Command::Flush(done)).is_err() {
            return;
        }
        let _ = finished.await;
    }
}

async fn run_writer(
    store: Arc<dyn ContactEventStore>,
    nominal_duration_secs: i64,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Record(reading) => {
                let event = ContactEvent::from_reading(
                    &reading.identifier,
                    reading.rssi,
                    reading.timestamp.timestamp_millis(),
                    reading.tx_power_advertised,
                    nominal_duration_secs,
                );

                match store.create_or_update(event).await {
                    Ok(()) => debug!(
                        "Saved reading for {} (rssi {})",
                        reading.identifier.cryptogram.fingerprint(),
                        reading.rssi
                    ),
                    Err(e) => error!("Failed to save contact event: {}", e),
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Contact event writer stopped");
}
