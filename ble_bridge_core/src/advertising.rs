//! Advertising-data ingress: AD-structure parsing into the host-stack
//! object-model representation (spec §4.5).

use std::collections::{BTreeMap, BTreeSet};

/// A parsed advertisement, ready for the host-stack collaborator to
/// register (spec §3 "Advertisement descriptor").
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AdvertisementDescriptor {
    pub local_name: Option<String>,
    pub service_uuids: BTreeSet<String>,
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    pub service_data: BTreeMap<String, Vec<u8>>,
    pub include_tx_power: bool,
}

/// Iterates `[length:u8, type:u8, data[length-1]]` AD structures, stopping
/// silently (not erroring) at the first structure that would overrun the
/// buffer, per spec §4.5.
fn parse_ad_structures(buf: &[u8]) -> AdvertisementDescriptor {
    let mut descriptor = AdvertisementDescriptor::default();
    let mut offset = 0usize;
    while offset < buf.len() {
        let length = buf[offset] as usize;
        if length == 0 {
            break;
        }
        let entry_end = offset + 1 + length;
        if entry_end > buf.len() {
            break;
        }
        let ad_type = buf[offset + 1];
        let data = &buf[offset + 2..entry_end];
        match ad_type {
            0x01 => {
                // Flags — ignored, the host stack handles them.
            }
            0x02 | 0x03 => {
                for chunk in data.chunks_exact(2) {
                    let uuid = u16::from_le_bytes([chunk[0], chunk[1]]);
                    descriptor.service_uuids.insert(format!("{uuid:04x}"));
                }
            }
            0x06 | 0x07 => {
                for chunk in data.chunks_exact(16) {
                    descriptor.service_uuids.insert(format_uuid128(chunk));
                }
            }
            0x08 | 0x09 => {
                descriptor.local_name = Some(String::from_utf8_lossy(data).into_owned());
            }
            0x16 => {
                if data.len() >= 2 {
                    let uuid = u16::from_le_bytes([data[0], data[1]]);
                    descriptor
                        .service_data
                        .insert(format!("{uuid:04x}"), data[2..].to_vec());
                }
            }
            0xFF => {
                if data.len() >= 2 {
                    let company_id = u16::from_le_bytes([data[0], data[1]]);
                    descriptor
                        .manufacturer_data
                        .insert(company_id, data[2..].to_vec());
                }
            }
            _ => {}
        }
        offset = entry_end;
    }
    descriptor
}

fn format_uuid128(bytes_le: &[u8]) -> String {
    let mut be = [0u8; 16];
    for (i, b) in bytes_le.iter().rev().enumerate() {
        be[i] = *b;
    }
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        be[0], be[1], be[2], be[3],
        be[4], be[5],
        be[6], be[7],
        be[8], be[9],
        be[10], be[11], be[12], be[13], be[14], be[15],
    )
}

/// Tracks the most recently ingested raw AD bytes so identical
/// re-advertisements are a no-op (spec §4.5, O3).
#[derive(Debug, Default)]
pub struct AdvertisingIngress {
    last_raw: Option<Vec<u8>>,
}

/// Outcome of [`AdvertisingIngress::ingest`]: whether the host-stack
/// collaborator needs to be notified.
#[derive(Debug, Eq, PartialEq)]
pub enum IngestOutcome {
    /// Raw AD bytes are unchanged since the last call; suppressed.
    Unchanged,
    /// New or changed AD data; the descriptor should be pushed.
    Updated(AdvertisementDescriptor),
}

impl AdvertisingIngress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares the raw AD-data bytes to the last observed value (not a
    /// semantic comparison — reordered-but-identical AD structures would
    /// still count as a change, which spec §9 open question 3 accepts).
    pub fn ingest(&mut self, raw_ad_data: &[u8]) -> IngestOutcome {
        if self.last_raw.as_deref() == Some(raw_ad_data) {
            return IngestOutcome::Unchanged;
        }
        self.last_raw = Some(raw_ad_data.to_vec());
        IngestOutcome::Updated(parse_ad_structures(raw_ad_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_ad_from_spec_s1() -> Vec<u8> {
        // AD structures inside S1's ADV_IND payload, after the 6-byte
        // adv_addr prefix: Flags, 16-bit service UUID 0xfff6, local name
        // "MatterDev".
        let mut buf = vec![];
        buf.extend_from_slice(&[0x02, 0x01, 0x06]);
        buf.extend_from_slice(&[0x03, 0x03, 0xF6, 0xFF]);
        buf.extend_from_slice(&[
            0x0B, 0x09, b'M', b'a', b't', b't', b'e', b'r', b'D', b'e', b'v',
        ]);
        buf
    }

    #[test]
    fn scenario_s1_advertising_ingress() {
        let mut ingress = AdvertisingIngress::new();
        let descriptor = match ingress.ingest(&raw_ad_from_spec_s1()) {
            IngestOutcome::Updated(descriptor) => descriptor,
            IngestOutcome::Unchanged => panic!("expected first ingest to update"),
        };
        assert_eq!(descriptor.local_name.as_deref(), Some("MatterDev"));
        assert_eq!(
            descriptor.service_uuids,
            BTreeSet::from(["fff6".to_string()])
        );
        assert!(descriptor.manufacturer_data.is_empty());
    }

    #[test]
    fn scenario_s6_duplicate_ad_bytes_are_idempotent() {
        let mut ingress = AdvertisingIngress::new();
        let raw = raw_ad_from_spec_s1();
        assert!(matches!(ingress.ingest(&raw), IngestOutcome::Updated(_)));
        assert_eq!(ingress.ingest(&raw), IngestOutcome::Unchanged);
    }

    #[test]
    fn truncated_ad_structure_stops_silently() {
        let buf = [0x05, 0x09, b'h', b'i'];
        let descriptor = match AdvertisingIngress::new().ingest(&buf) {
            IngestOutcome::Updated(descriptor) => descriptor,
            IngestOutcome::Unchanged => panic!(),
        };
        assert_eq!(descriptor.local_name, None);
    }

    #[test]
    fn manufacturer_and_service_data_are_parsed() {
        let mut buf = vec![];
        buf.extend_from_slice(&[0x05, 0xFF, 0x4C, 0x00, 0x01, 0x02]);
        buf.extend_from_slice(&[0x04, 0x16, 0x0F, 0x18, 0x7B]);
        let descriptor = match AdvertisingIngress::new().ingest(&buf) {
            IngestOutcome::Updated(descriptor) => descriptor,
            IngestOutcome::Unchanged => panic!(),
        };
        assert_eq!(
            descriptor.manufacturer_data.get(&0x004C),
            Some(&vec![0x01, 0x02])
        );
        assert_eq!(descriptor.service_data.get("180f"), Some(&vec![0x7B]));
    }

    #[test]
    fn uuid128_is_formatted_in_canonical_form() {
        let mut data = vec![0x11, 0x07];
        let uuid_le: [u8; 16] = [
            0xfb, 0x34, 0x9b, 0x5f, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x24, 0x11,
            0x00, 0x00,
        ];
        data.extend_from_slice(&uuid_le);
        let descriptor = match AdvertisingIngress::new().ingest(&data) {
            IngestOutcome::Updated(descriptor) => descriptor,
            IngestOutcome::Unchanged => panic!(),
        };
        assert_eq!(
            descriptor.service_uuids,
            BTreeSet::from(["00001124-0000-1000-8000-00805f9b34fb".to_string()])
        );
    }
}
