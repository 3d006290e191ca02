//! Observability hook for radio sessions

use crate::adapter::DeviceAddress;
use crate::error::ProximityError;
use identity::BroadcastIdentifier;
use std::sync::Mutex;
use tracing::{debug, error, info};

/// Receives the outcome of every radio session step that matters.
///
/// Errors are reported here exactly once per failed session, keyed by the
/// physical address.
pub trait BleEventEmitter: Send + Sync {
    fn success_event(
        &self,
        address: &DeviceAddress,
        identifier: &BroadcastIdentifier,
        rssi: i16,
        tx_power_advertised: Option<i16>,
    );

    fn error_event(&self, address: &DeviceAddress, error: &ProximityError);

    fn disconnect_event(&self, address: &DeviceAddress);
}

/// Emits session events as log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventEmitter;

impl BleEventEmitter for TracingEventEmitter {
    fn success_event(
        &self,
        address: &DeviceAddress,
        identifier: &BroadcastIdentifier,
        rssi: i16,
        tx_power_advertised: Option<i16>,
    ) {
        debug!(
            address = %address,
            cryptogram = %identifier.cryptogram.fingerprint(),
            rssi,
            tx_power_advertised = ?tx_power_advertised,
            "Read RSSI"
        );
    }

    fn error_event(&self, address: &DeviceAddress, error: &ProximityError) {
        error!(address = %address, error = %error, "Radio session failed");
    }

    fn disconnect_event(&self, address: &DeviceAddress) {
        info!(address = %address, "Disconnected");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    Success {
        address: DeviceAddress,
        identifier: BroadcastIdentifier,
        rssi: i16,
    },
    Error {
        address: DeviceAddress,
        error: ProximityError,
    },
    Disconnect {
        address: DeviceAddress,
    },
}

/// Keeps every event in memory, for inspection after a run
#[derive(Debug, Default)]
pub struct RecordingEventEmitter {
    events: Mutex<Vec<BleEvent>>,
}

impl RecordingEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BleEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn errors_for(&self, address: &str) -> Vec<ProximityError> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BleEvent::Error { address: a, error } if a == address => Some(error),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: BleEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl BleEventEmitter for RecordingEventEmitter {
    fn success_event(
        &self,
        address: &DeviceAddress,
        identifier: &BroadcastIdentifier,
        rssi: i16,
        _tx_power_advertised: Option<i16>,
    ) {
        self.push(BleEvent::Success {
            address: address.clone(),
            identifier: identifier.clone(),
            rssi,
        });
    }

    fn error_event(&self, address: &DeviceAddress, error: &ProximityError) {
        self.push(BleEvent::Error {
            address: address.clone(),
            error: error.clone(),
        });
    }

    fn disconnect_event(&self, address: &DeviceAddress) {
        self.push(BleEvent::Disconnect {
            address: address.clone(),
        });
    }
}
