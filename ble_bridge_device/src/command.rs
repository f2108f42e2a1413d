//! Raw HCI command encoders for the raw-socket transport backend (spec §6
//! "raw HCI command path").
//!
//! Only the handful of `LE Controller` commands the advertising path needs
//! are modeled; anything else is out of scope (spec §1 non-goals).

use ble_bridge_core::advertising::AdvertisementDescriptor;

const OGF_LE_CONTROLLER: u16 = 0x08;
const OCF_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
const OCF_SET_ADVERTISING_DATA: u16 = 0x0008;
const OCF_SET_SCAN_RESPONSE_DATA: u16 = 0x0009;
const OCF_SET_ADVERTISE_ENABLE: u16 = 0x000A;

const AD_DATA_LEN: usize = 31;

fn opcode(ogf: u16, ocf: u16) -> u16 {
    (ogf << 10) | ocf
}

/// Wraps `params` in the standard HCI command packet header: `0x01,
/// opcode:u16-LE, param_len:u8, params`.
fn encode_command(ocf: u16, params: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + params.len());
    buf.push(0x01);
    buf.extend_from_slice(&opcode(OGF_LE_CONTROLLER, ocf).to_le_bytes());
    buf.push(params.len() as u8);
    buf.extend_from_slice(params);
    buf
}

/// `HCI_LE_Set_Advertising_Parameters` with undirected connectable
/// advertising on all channels at the defaults spec §6 calls for.
pub fn set_advertising_parameters() -> Vec<u8> {
    let mut params = Vec::with_capacity(15);
    params.extend_from_slice(&0x0100u16.to_le_bytes()); // min interval
    params.extend_from_slice(&0x0100u16.to_le_bytes()); // max interval
    params.push(0x00); // ADV_IND
    params.push(0x00); // own address type: public
    params.push(0x00); // peer address type: public
    params.extend_from_slice(&[0u8; 6]); // peer address: unused
    params.push(0x07); // advertising channel map: all
    params.push(0x00); // filter policy: scan/connect from any
    encode_command(OCF_SET_ADVERTISING_PARAMETERS, &params)
}

pub fn set_advertising_data(descriptor: &AdvertisementDescriptor) -> Vec<u8> {
    let ad = encode_ad_structures(descriptor);
    encode_command(OCF_SET_ADVERTISING_DATA, &padded_block(&ad))
}

pub fn set_scan_response_data(descriptor: &AdvertisementDescriptor) -> Vec<u8> {
    let ad = encode_ad_structures(descriptor);
    encode_command(OCF_SET_SCAN_RESPONSE_DATA, &padded_block(&ad))
}

pub fn set_advertising_enable(enable: bool) -> Vec<u8> {
    encode_command(OCF_SET_ADVERTISE_ENABLE, &[enable as u8])
}

/// Prefixes `ad` with its actual length and zero-pads to the fixed 31-byte
/// field the command expects.
fn padded_block(ad: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + AD_DATA_LEN);
    buf.push(ad.len().min(AD_DATA_LEN) as u8);
    let mut data = ad.to_vec();
    data.resize(AD_DATA_LEN, 0);
    buf.extend_from_slice(&data);
    buf
}

/// Flattens an [`AdvertisementDescriptor`] back into `[length, type, data]`
/// AD structures, the inverse of `ble_bridge_core::advertising`'s parser.
fn encode_ad_structures(descriptor: &AdvertisementDescriptor) -> Vec<u8> {
    let mut buf = Vec::new();

    if let Some(name) = &descriptor.local_name {
        push_structure(&mut buf, 0x09, name.as_bytes());
    }
    if !descriptor.service_uuids.is_empty() {
        let mut data = Vec::new();
        for uuid in &descriptor.service_uuids {
            if uuid.len() == 4 {
                if let Ok(short) = u16::from_str_radix(uuid, 16) {
                    data.extend_from_slice(&short.to_le_bytes());
                }
            }
        }
        if !data.is_empty() {
            push_structure(&mut buf, 0x03, &data);
        }
    }
    for (company_id, payload) in &descriptor.manufacturer_data {
        let mut data = company_id.to_le_bytes().to_vec();
        data.extend_from_slice(payload);
        push_structure(&mut buf, 0xFF, &data);
    }
    for (uuid, payload) in &descriptor.service_data {
        if uuid.len() == 4 {
            if let Ok(short) = u16::from_str_radix(uuid, 16) {
                let mut data = short.to_le_bytes().to_vec();
                data.extend_from_slice(payload);
                push_structure(&mut buf, 0x16, &data);
            }
        }
    }
    buf
}

fn push_structure(buf: &mut Vec<u8>, ad_type: u8, data: &[u8]) {
    let length = (data.len() + 1) as u8;
    buf.push(length);
    buf.push(ad_type);
    buf.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertising_enable_encodes_command_header() {
        let encoded = set_advertising_enable(true);
        assert_eq!(encoded[0], 0x01);
        let opcode = u16::from_le_bytes([encoded[1], encoded[2]]);
        assert_eq!(opcode, (OGF_LE_CONTROLLER << 10) | OCF_SET_ADVERTISE_ENABLE);
        assert_eq!(encoded[3], 1);
        assert_eq!(encoded[4], 1);
    }

    #[test]
    fn advertising_data_block_is_31_bytes_plus_length_prefix() {
        let mut descriptor = AdvertisementDescriptor::default();
        descriptor.local_name = Some("MatterDev".to_string());
        let encoded = set_advertising_data(&descriptor);
        // command header (4 bytes) + length prefix (1) + 31 byte data field.
        assert_eq!(encoded.len(), 4 + 1 + AD_DATA_LEN);
        assert_eq!(encoded[4] as usize, 2 + "MatterDev".len());
    }

    #[test]
    fn encode_ad_structures_round_trips_through_the_core_parser() {
        use ble_bridge_core::advertising::{AdvertisingIngress, IngestOutcome};

        let mut descriptor = AdvertisementDescriptor::default();
        descriptor.local_name = Some("hi".to_string());
        descriptor.service_uuids.insert("180f".to_string());
        let ad = encode_ad_structures(&descriptor);

        let reparsed = match AdvertisingIngress::new().ingest(&ad) {
            IngestOutcome::Updated(descriptor) => descriptor,
            IngestOutcome::Unchanged => panic!("first ingest is always an update"),
        };
        assert_eq!(reparsed.local_name.as_deref(), Some("hi"));
        assert_eq!(reparsed.service_uuids, descriptor.service_uuids);
    }
}
