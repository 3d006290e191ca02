//! Proximity detection over Bluetooth LE
//!
//! Discovers nearby devices, reads their broadcast identifiers, samples
//! signal strength while connected, and turns the readings into persisted
//! contact events ready for upload.

pub mod adapter;
pub mod aggregator;
pub mod btle;
pub mod colocation;
pub mod contact_event;
pub mod error;
pub mod events;
pub mod scanner;
pub mod session;
pub mod status_handler;

pub use adapter::{
    AdapterState, DeviceAddress, Discovery, RadioAdapter, RadioLink, IDENTITY_CHARACTERISTIC_UUID,
    SERVICE_UUID,
};
pub use aggregator::{ContactReading, SaveContactWorker};
pub use btle::BtleRadioAdapter;
pub use colocation::{
    timestamps_to_intervals, CoLocationData, CoLocationDataProvider, CoLocationEvent, Intervals,
};
pub use contact_event::{ContactEvent, ContactEventStore, InMemoryContactEventStore};
pub use error::{ProximityError, ProximityResult};
pub use events::{BleEvent, BleEventEmitter, RecordingEventEmitter, TracingEventEmitter};
pub use scanner::Scanner;
pub use session::SessionState;
pub use status_handler::{BluetoothStatusHandler, CombinedStatus, RadioDelegate, StatusNotifier};
