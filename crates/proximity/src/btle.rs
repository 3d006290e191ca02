//! btleplug-backed radio adapter

use crate::adapter::{
    AdapterState, DeviceAddress, Discovery, RadioAdapter, RadioLink, SERVICE_UUID,
};
use crate::error::{ProximityError, ProximityResult};
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct BtleRadioAdapter {
    adapter: Adapter,
    state: watch::Sender<AdapterState>,
}

impl BtleRadioAdapter {
    /// Bind to the first adapter the platform reports
    pub async fn new() -> ProximityResult<Self> {
        let manager = Manager::new().await.map_err(|e| {
            ProximityError::AdapterUnavailable(format!("Failed to create BLE manager: {}", e))
        })?;

        let adapters = manager.adapters().await.map_err(|e| {
            ProximityError::AdapterUnavailable(format!("Failed to get BLE adapters: {}", e))
        })?;

        let adapter = adapters.into_iter().next().ok_or_else(|| {
            ProximityError::AdapterUnavailable("No BLE adapter found".to_string())
        })?;

        info!("BLE adapter initialized: {:?}", adapter.adapter_info().await);

        let (state, _) = watch::channel(AdapterState::PoweredOn);
        Ok(Self { adapter, state })
    }

    /// btleplug has no portable power-state stream, so the state is inferred
    /// from whether adapter calls succeed.
    fn observe(&self, observed: AdapterState) {
        self.state.send_if_modified(|current| {
            if *current == observed {
                return false;
            }
            info!("BLE adapter is now {:?}", observed);
            *current = observed;
            true
        });
    }

    async fn find_peripheral(&self, address: &DeviceAddress) -> ProximityResult<Peripheral> {
        let peripherals = self.adapter.peripherals().await.map_err(|e| {
            ProximityError::AdapterUnavailable(format!("Failed to get peripherals: {}", e))
        })?;

        peripherals
            .into_iter()
            .find(|p| p.address().to_string() == *address)
            .ok_or_else(|| ProximityError::radio(address.as_str(), "peripheral no longer visible"))
    }
}

#[async_trait]
impl RadioAdapter for BtleRadioAdapter {
    fn state_changes(&self) -> watch::Receiver<AdapterState> {
        self.state.subscribe()
    }

    async fn start_discovery(&self) -> ProximityResult<()> {
        let filter = ScanFilter {
            services: vec![SERVICE_UUID],
        };

        match self.adapter.start_scan(filter).await {
            Ok(()) => {
                self.observe(AdapterState::PoweredOn);
                Ok(())
            }
            Err(e) => {
                self.observe(AdapterState::PoweredOff);
                Err(ProximityError::AdapterUnavailable(format!(
                    "Failed to start BLE scan: {}",
                    e
                )))
            }
        }
    }

    async fn stop_discovery(&self) -> ProximityResult<()> {
        self.adapter.stop_scan().await.map_err(|e| {
            ProximityError::AdapterUnavailable(format!("Failed to stop BLE scan: {}", e))
        })
    }

    async fn discovered(&self) -> ProximityResult<Vec<Discovery>> {
        let peripherals = match self.adapter.peripherals().await {
            Ok(peripherals) => peripherals,
            Err(e) => {
                self.observe(AdapterState::PoweredOff);
                return Err(ProximityError::AdapterUnavailable(format!(
                    "Failed to get peripherals: {}",
                    e
                )));
            }
        };
        self.observe(AdapterState::PoweredOn);

        let mut found = Vec::new();
        for peripheral in peripherals {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Error reading peripheral properties: {}", e);
                    continue;
                }
            };

            if !properties.services.iter().any(|uuid| uuid == &SERVICE_UUID) {
                continue;
            }

            found.push(Discovery {
                address: peripheral.address().to_string(),
                tx_power_advertised: properties.tx_power_level,
            });
        }

        Ok(found)
    }

    async fn connect(&self, address: &DeviceAddress) -> ProximityResult<Box<dyn RadioLink>> {
        let peripheral = self.find_peripheral(address).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| ProximityError::radio(address.as_str(), format!("connect failed: {}", e)))?;

        if let Err(e) = peripheral.discover_services().await {
            let _ = peripheral.disconnect().await;
            return Err(ProximityError::radio(
                address.as_str(),
                format!("service discovery failed: {}", e),
            ));
        }

        Ok(Box::new(BtleLink {
            address: address.clone(),
            peripheral,
        }))
    }
}

struct BtleLink {
    address: DeviceAddress,
    peripheral: Peripheral,
}

impl BtleLink {
    async fn ensure_connected(&self) -> ProximityResult<()> {
        let connected = self
            .peripheral
            .is_connected()
            .await
            .map_err(|e| ProximityError::radio(self.address.as_str(), e))?;

        if connected {
            Ok(())
        } else {
            Err(ProximityError::Disconnected(self.address.clone()))
        }
    }
}

#[async_trait]
impl RadioLink for BtleLink {
    fn address(&self) -> &DeviceAddress {
        &self.address
    }

    async fn request_mtu(&self, mtu: usize) -> ProximityResult<usize> {
        // The platform stack negotiates the MTU on connect.
        self.ensure_connected().await?;
        debug!("MTU of {} requested for {}", mtu, self.address);
        Ok(mtu)
    }

    async fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> ProximityResult<Vec<u8>> {
        self.ensure_connected().await?;

        let target = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or_else(|| ProximityError::UnsupportedDevice(self.address.clone()))?;

        self.peripheral
            .read(&target)
            .await
            .map_err(|e| ProximityError::radio(self.address.as_str(), format!("read failed: {}", e)))
    }

    async fn read_rssi(&self) -> ProximityResult<i16> {
        self.ensure_connected().await?;

        let properties = self
            .peripheral
            .properties()
            .await
            .map_err(|e| ProximityError::radio(self.address.as_str(), e))?;

        properties
            .and_then(|p| p.rssi)
            .ok_or_else(|| ProximityError::radio(self.address.as_str(), "no RSSI reported"))
    }

    async fn disconnect(&self) -> ProximityResult<()> {
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("Disconnect from {} failed: {}", self.address, e);
            return Err(ProximityError::radio(self.address.as_str(), e));
        }
        Ok(())
    }
}
