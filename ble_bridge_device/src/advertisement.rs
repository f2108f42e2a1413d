//! Advertisement registration for the BlueZ object-manager backend (spec
//! §4.3 "register/update the advertisement with the host stack").

use crate::adapter::Adapter;
use crate::error::{DeviceError, Result};
use ble_bridge_core::advertising::AdvertisementDescriptor;
use bluer::adv::Advertisement;
use uuid::Uuid;

/// Owns the currently-registered `AdvertisementHandle`, if any, and
/// re-registers from scratch on every update since `bluer` advertisements
/// are immutable once submitted to BlueZ.
#[derive(Debug, Default)]
pub struct AdvertisementRegistrar {
    handle: Option<bluer::adv::AdvertisementHandle>,
}

impl AdvertisementRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unregisters the previous advertisement (if any) and registers
    /// `descriptor` in its place.
    #[tracing::instrument(target = "device", skip(self, adapter))]
    pub async fn update(
        &mut self,
        adapter: &Adapter,
        descriptor: &AdvertisementDescriptor,
    ) -> Result<()> {
        self.handle.take();
        let advertisement = to_bluer_advertisement(descriptor);
        let handle = adapter
            .bluer_adapter()
            .advertise(advertisement)
            .await
            .map_err(|_| DeviceError::AdvertisingRegistrationFailed)?;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn deregister(&mut self) {
        self.handle.take();
    }
}

fn to_bluer_advertisement(descriptor: &AdvertisementDescriptor) -> Advertisement {
    Advertisement {
        advertisement_type: bluer::adv::Type::Peripheral,
        service_uuids: descriptor
            .service_uuids
            .iter()
            .filter_map(|uuid| parse_uuid(uuid))
            .collect(),
        manufacturer_data: descriptor.manufacturer_data.clone(),
        service_data: descriptor
            .service_data
            .iter()
            .filter_map(|(uuid, data)| parse_uuid(uuid).map(|uuid| (uuid, data.clone())))
            .collect(),
        local_name: descriptor.local_name.clone(),
        discoverable: Some(true),
        system_includes: if descriptor.include_tx_power {
            [bluer::adv::Feature::TxPower].into_iter().collect()
        } else {
            Default::default()
        },
        ..Default::default()
    }
}

/// Expands a short (16-bit, hex-formatted) or already-canonical 128-bit UUID
/// string into a full [`Uuid`], using the standard Bluetooth base UUID for
/// the short form.
fn parse_uuid(raw: &str) -> Option<Uuid> {
    if raw.len() == 4 {
        Uuid::parse_str(&format!("0000{raw}-0000-1000-8000-00805f9b34fb")).ok()
    } else {
        Uuid::parse_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuid_expands_to_bluetooth_base_uuid() {
        assert_eq!(
            parse_uuid("180f"),
            Uuid::parse_str("0000180f-0000-1000-8000-00805f9b34fb").ok()
        );
    }

    #[test]
    fn canonical_128_bit_uuid_passes_through() {
        let canonical = "00001124-0000-1000-8000-00805f9b34fb";
        assert_eq!(parse_uuid(canonical), Uuid::parse_str(canonical).ok());
    }

    #[test]
    fn malformed_uuid_is_dropped_not_panicked() {
        assert_eq!(parse_uuid("not-a-uuid"), None);
    }
}
