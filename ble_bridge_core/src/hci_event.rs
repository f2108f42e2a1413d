//! Parsing of inbound HCI packets: LE Meta subevents, Disconnection
//! Complete, and ACL data headers (spec §4.6).

use thiserror::Error;

#[derive(Clone, Error, Debug, Eq, PartialEq)]
pub enum HciParseError {
    #[error("hci packet is too short for its declared type")]
    TooShort,
    #[error("unrecognized hci packet type byte: {0:#04x}")]
    UnknownPacketType(u8),
}

/// An LE peer address copied verbatim from the host event (spec §4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PeerAddress {
    pub addr_type: u8,
    pub addr: [u8; 6],
}

/// The two `LE Connection Complete` event variants, parsed identically
/// apart from where the fixed-size fields start (spec §4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeConnectionComplete {
    pub handle: u16,
    pub role: u8,
    pub peer: PeerAddress,
    pub interval: u16,
    pub latency: u16,
    pub timeout: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DisconnectionComplete {
    pub handle: u16,
    pub reason: u8,
}

/// A decoded HCI event packet (spec §4.6). Event codes other than `0x3E`
/// and `0x05` are not needed by the bridge and fold into `Other`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HciEvent {
    LeConnectionComplete(LeConnectionComplete),
    DisconnectionComplete(DisconnectionComplete),
    /// A status != 0 Connection Complete, or any event the bridge ignores.
    Other,
}

/// `pb_flag`/`bc_flag`-tagged ACL data extracted from the HCI ACL packet
/// header (spec §4.6).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AclData {
    pub pb_flag: u8,
    pub bc_flag: u8,
    pub handle: u16,
    pub payload: Vec<u8>,
}

/// The union of packet types the reactor demultiplexes on the leading
/// packet-type byte (spec §4.6: `0x04` event, `0x02` ACL data).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HciPacket {
    Event(HciEvent),
    Acl(AclData),
}

impl HciPacket {
    pub fn parse(buf: &[u8]) -> Result<Self, HciParseError> {
        let (packet_type, rest) = buf.split_first().ok_or(HciParseError::TooShort)?;
        match *packet_type {
            0x04 => Ok(Self::Event(parse_event(rest)?)),
            0x02 => Ok(Self::Acl(parse_acl(rest)?)),
            other => Err(HciParseError::UnknownPacketType(other)),
        }
    }
}

fn parse_event(buf: &[u8]) -> Result<HciEvent, HciParseError> {
    // `event_code:u8, param_len:u8, params[param_len]`.
    if buf.len() < 2 {
        return Err(HciParseError::TooShort);
    }
    let event_code = buf[0];
    let params = &buf[2..];
    match event_code {
        0x3E => parse_le_meta(params),
        0x05 => {
            if params.len() < 4 {
                return Err(HciParseError::TooShort);
            }
            let status = params[0];
            if status != 0 {
                return Ok(HciEvent::Other);
            }
            Ok(HciEvent::DisconnectionComplete(DisconnectionComplete {
                handle: u16::from_le_bytes([params[1], params[2]]),
                reason: params[3],
            }))
        }
        _ => Ok(HciEvent::Other),
    }
}

fn parse_le_meta(params: &[u8]) -> Result<HciEvent, HciParseError> {
    let (subevent, rest) = params.split_first().ok_or(HciParseError::TooShort)?;
    match *subevent {
        0x01 => parse_connection_complete(rest, 0),
        0x0A => parse_connection_complete(rest, 12),
        _ => Ok(HciEvent::Other),
    }
}

/// Parses the common `LE Connection Complete` tail, skipping
/// `extra_offset` bytes of resolvable-private-address fields present only
/// in the Enhanced variant (spec §4.6).
fn parse_connection_complete(buf: &[u8], extra_offset: usize) -> Result<HciEvent, HciParseError> {
    let min_len = 10 + extra_offset;
    if buf.len() < min_len {
        return Err(HciParseError::TooShort);
    }
    let status = buf[0];
    if status != 0 {
        return Ok(HciEvent::Other);
    }
    let handle = u16::from_le_bytes([buf[1], buf[2]]);
    let role = buf[3];
    let peer_addr_type = buf[4];
    let mut peer_addr = [0u8; 6];
    peer_addr.copy_from_slice(&buf[5..11]);
    let tail = &buf[11 + extra_offset..];
    if tail.len() < 6 {
        return Err(HciParseError::TooShort);
    }
    let interval = u16::from_le_bytes([tail[0], tail[1]]);
    let latency = u16::from_le_bytes([tail[2], tail[3]]);
    let timeout = u16::from_le_bytes([tail[4], tail[5]]);
    Ok(HciEvent::LeConnectionComplete(LeConnectionComplete {
        handle,
        role,
        peer: PeerAddress {
            addr_type: peer_addr_type,
            addr: peer_addr,
        },
        interval,
        latency,
        timeout,
    }))
}

fn parse_acl(buf: &[u8]) -> Result<AclData, HciParseError> {
    if buf.len() < 4 {
        return Err(HciParseError::TooShort);
    }
    let handle_flags = u16::from_le_bytes([buf[0], buf[1]]);
    let length = u16::from_le_bytes([buf[2], buf[3]]) as usize;
    if buf.len() < 4 + length {
        return Err(HciParseError::TooShort);
    }
    Ok(AclData {
        pb_flag: ((handle_flags >> 12) & 0b11) as u8,
        bc_flag: ((handle_flags >> 14) & 0b11) as u8,
        handle: handle_flags & 0x0FFF,
        payload: buf[4..4 + length].to_vec(),
    })
}

/// Encodes an outbound HCI ACL data packet: `0x02, handle_flags:u16-LE,
/// length:u16-LE, payload` (spec §4.7).
pub fn encode_acl(handle: u16, pb_flag: u8, bc_flag: u8, payload: &[u8]) -> Vec<u8> {
    let handle_flags = (handle & 0x0FFF) | ((pb_flag as u16) << 12) | ((bc_flag as u16) << 14);
    let mut buf = Vec::with_capacity(5 + payload.len());
    buf.push(0x02);
    buf.extend_from_slice(&handle_flags.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s2_connection_complete() {
        let mut buf = vec![0x04, 0x3E];
        let params: Vec<u8> = vec![
            0x01, // subevent
            0x00, // status = success
            0x40, 0x00, // handle = 0x0040
            0x01, // role
            0x00, // peer addr type
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, // peer addr
            0x18, 0x00, // interval
            0x00, 0x00, // latency
            0xC8, 0x00, // timeout
        ];
        buf.push(params.len() as u8);
        buf.extend_from_slice(&params);
        let packet = HciPacket::parse(&buf).unwrap();
        assert_eq!(
            packet,
            HciPacket::Event(HciEvent::LeConnectionComplete(LeConnectionComplete {
                handle: 0x0040,
                role: 1,
                peer: PeerAddress {
                    addr_type: 0,
                    addr: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
                },
                interval: 0x0018,
                latency: 0,
                timeout: 0x00C8,
            }))
        );
    }

    #[test]
    fn connection_complete_with_nonzero_status_is_ignored() {
        let mut buf = vec![0x04, 0x3E];
        let params: Vec<u8> = vec![0x01, 0x0E, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        buf.push(params.len() as u8);
        buf.extend_from_slice(&params);
        assert_eq!(
            HciPacket::parse(&buf).unwrap(),
            HciPacket::Event(HciEvent::Other)
        );
    }

    #[test]
    fn disconnection_complete_parses_handle_and_reason() {
        let mut buf = vec![0x04, 0x05];
        let params = [0x00u8, 0x40, 0x00, 0x13];
        buf.push(params.len() as u8);
        buf.extend_from_slice(&params);
        assert_eq!(
            HciPacket::parse(&buf).unwrap(),
            HciPacket::Event(HciEvent::DisconnectionComplete(DisconnectionComplete {
                handle: 0x0040,
                reason: 0x13,
            }))
        );
    }

    #[test]
    fn scenario_s3_acl_encode() {
        let encoded = encode_acl(0x0040, 0x02, 0x00, &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(
            encoded,
            vec![0x02, 0x40, 0x20, 0x04, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn scenario_s4_acl_parse() {
        let buf = [0x02, 0x40, 0x20, 0x04, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let packet = HciPacket::parse(&buf).unwrap();
        assert_eq!(
            packet,
            HciPacket::Acl(AclData {
                pb_flag: 2,
                bc_flag: 0,
                handle: 0x0040,
                payload: vec![0xAA, 0xBB, 0xCC, 0xDD],
            })
        );
    }
}
