//! Reacts to the combined radio/location/client status

use tracing::{debug, info};

/// Radio-side actions the handler drives
pub trait RadioDelegate: Send + Sync {
    fn start_gatt_and_advertise(&self);
    fn stop_gatt_and_advertise(&self);
    fn start_scan(&self);
    fn stop_scanner(&self);
}

/// User-facing notices about disabled radios
pub trait StatusNotifier: Send + Sync {
    fn show_location_disabled(&self);
    fn hide_location_disabled(&self);
    fn show_bluetooth_disabled(&self);
    fn hide_bluetooth_disabled(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedStatus {
    pub is_ble_client_ready: bool,
    pub is_bluetooth_enabled: bool,
    pub is_location_enabled: bool,
}

pub struct BluetoothStatusHandler<D, N> {
    delegate: D,
    notifier: N,
}

impl<D: RadioDelegate, N: StatusNotifier> BluetoothStatusHandler<D, N> {
    pub fn new(delegate: D, notifier: N) -> Self {
        Self { delegate, notifier }
    }

    pub fn handle(&self, status: CombinedStatus) {
        debug!("Radio status changed: {:?}", status);

        if status.is_location_enabled {
            self.notifier.hide_location_disabled();
        } else {
            self.notifier.show_location_disabled();
        }

        if status.is_bluetooth_enabled {
            self.notifier.hide_bluetooth_disabled();
        } else {
            info!("Bluetooth disabled, stopping radio activity");
            self.delegate.stop_scanner();
            self.delegate.stop_gatt_and_advertise();
            self.notifier.show_bluetooth_disabled();
        }

        if status.is_ble_client_ready {
            self.delegate.start_gatt_and_advertise();
            self.delegate.start_scan();
        }
    }
}
