//! Radio adapter abstraction for cross-platform support

use crate::error::ProximityResult;
use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

/// Service advertised by every participating device
pub const SERVICE_UUID: Uuid = Uuid::from_bytes([
    0xc1, 0xf5, 0x98, 0x3c, 0xfa, 0x94, 0x4a, 0xc8, 0x8e, 0x2e, 0xbb, 0x86, 0xd6, 0xde, 0x9b, 0x21,
]);

/// Characteristic that yields the peer's broadcast identifier when read
pub const IDENTITY_CHARACTERISTIC_UUID: Uuid = Uuid::from_bytes([
    0x85, 0xbf, 0x33, 0x7c, 0x5b, 0x64, 0x48, 0xa8, 0xa6, 0x6a, 0x38, 0x1c, 0x45, 0x7b, 0x8a, 0x9e,
]);

/// Physical radio address of a remote device
pub type DeviceAddress = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
}

/// A device seen advertising [`SERVICE_UUID`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub address: DeviceAddress,
    /// Transmit power from the advertisement, when the peer includes it
    pub tx_power_advertised: Option<i16>,
}

/// Platform-agnostic central-role operations
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Current power state plus every later change
    fn state_changes(&self) -> watch::Receiver<AdapterState>;

    async fn start_discovery(&self) -> ProximityResult<()>;

    async fn stop_discovery(&self) -> ProximityResult<()>;

    /// Devices currently visible that advertise the service
    async fn discovered(&self) -> ProximityResult<Vec<Discovery>>;

    async fn connect(&self, address: &DeviceAddress) -> ProximityResult<Box<dyn RadioLink>>;
}

/// An established connection to one remote device
#[async_trait]
pub trait RadioLink: Send + Sync {
    fn address(&self) -> &DeviceAddress;

    /// Ask for a transmission unit of `mtu` bytes, returning what was granted
    async fn request_mtu(&self, mtu: usize) -> ProximityResult<usize>;

    async fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> ProximityResult<Vec<u8>>;

    async fn read_rssi(&self) -> ProximityResult<i16>;

    async fn disconnect(&self) -> ProximityResult<()>;
}
