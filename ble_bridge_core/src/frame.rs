//! UDP framing and LL PDU byte layouts (spec §4.1, §6).

use crate::error::FrameError;
use strum::Display;

/// LL access address used by every advertising PDU; never valid for a data
/// channel connection (spec §3 I4, §6).
pub const ADVERTISING_ACCESS_ADDRESS: u32 = 0x8E89BED6;

/// Direction tag carried by the outer UDP frame (spec §4.1, §6).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum FrameDirection {
    /// `0x01`: simulator → bridge.
    SimToBridge,
    /// `0x02`: bridge → simulator.
    BridgeToSim,
}

impl FrameDirection {
    fn to_byte(self) -> u8 {
        match self {
            Self::SimToBridge => 0x01,
            Self::BridgeToSim => 0x02,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, FrameError> {
        match byte {
            0x01 => Ok(Self::SimToBridge),
            0x02 => Ok(Self::BridgeToSim),
            _ => Err(FrameError::MalformedFrame("unknown frame type byte")),
        }
    }
}

/// The outer UDP wrapper: `type:u8 | channel:u8 | length:u16-LE | payload`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UdpFrame {
    pub direction: FrameDirection,
    pub channel: u8,
    pub payload: Vec<u8>,
}

impl UdpFrame {
    pub fn new(direction: FrameDirection, channel: u8, payload: Vec<u8>) -> Self {
        Self {
            direction,
            channel,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.payload.len());
        buf.push(self.direction.to_byte());
        buf.push(self.channel);
        buf.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < 4 {
            return Err(FrameError::MalformedFrame("frame shorter than header"));
        }
        let direction = FrameDirection::from_byte(buf[0])?;
        let channel = buf[1];
        let length = u16::from_le_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < 4 + length {
            return Err(FrameError::MalformedFrame(
                "frame shorter than declared length",
            ));
        }
        Ok(Self {
            direction,
            channel,
            payload: buf[4..4 + length].to_vec(),
        })
    }
}

/// Advertising PDU type, encoded in `pdu_header` bits [3:0].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum AdvPduType {
    AdvInd,
    AdvDirectInd,
    AdvNonconnInd,
    ScanReq,
    ScanRsp,
    ConnectInd,
    AdvScanInd,
    Other(u8),
}

impl AdvPduType {
    fn to_nibble(self) -> u8 {
        match self {
            Self::AdvInd => 0x0,
            Self::AdvDirectInd => 0x1,
            Self::AdvNonconnInd => 0x2,
            Self::ScanReq => 0x3,
            Self::ScanRsp => 0x4,
            Self::ConnectInd => 0x5,
            Self::AdvScanInd => 0x6,
            Self::Other(n) => n & 0x0F,
        }
    }

    fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0x0 => Self::AdvInd,
            0x1 => Self::AdvDirectInd,
            0x2 => Self::AdvNonconnInd,
            0x3 => Self::ScanReq,
            0x4 => Self::ScanRsp,
            0x5 => Self::ConnectInd,
            0x6 => Self::AdvScanInd,
            other => Self::Other(other),
        }
    }
}

/// LL advertising frame: `access_address:u32-LE, pdu_header:u8,
/// pdu_length:u8, payload[pdu_length], crc_placeholder[3]` (spec §4.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdvFrame {
    pub access_address: u32,
    pub pdu_type: AdvPduType,
    pub tx_add: bool,
    pub rx_add: bool,
    pub payload: Vec<u8>,
}

impl AdvFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut header = self.pdu_type.to_nibble();
        if self.tx_add {
            header |= 1 << 6;
        }
        if self.rx_add {
            header |= 1 << 7;
        }
        let mut buf = Vec::with_capacity(6 + self.payload.len() + 3);
        buf.extend_from_slice(&self.access_address.to_le_bytes());
        buf.push(header);
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&[0u8; 3]);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < 6 {
            return Err(FrameError::ShortFrame);
        }
        let access_address = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let header = buf[4];
        let pdu_length = buf[5] as usize;
        if pdu_length + 6 > buf.len() {
            return Err(FrameError::ShortFrame);
        }
        Ok(Self {
            access_address,
            pdu_type: AdvPduType::from_nibble(header & 0x0F),
            tx_add: header & (1 << 6) != 0,
            rx_add: header & (1 << 7) != 0,
            payload: buf[6..6 + pdu_length].to_vec(),
        })
    }
}

/// LL data PDU payload type (LLID field).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Llid {
    Continuation,
    Start,
    Control,
    Reserved,
}

impl Llid {
    fn to_bits(self) -> u8 {
        match self {
            Self::Reserved => 0b00,
            Self::Continuation => 0b01,
            Self::Start => 0b10,
            Self::Control => 0b11,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Self::Continuation,
            0b10 => Self::Start,
            0b11 => Self::Control,
            _ => Self::Reserved,
        }
    }
}

/// LL data frame: `access_address:u32-LE, data_header:u16-LE,
/// payload[length], crc_placeholder[3]` (spec §4.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataFrame {
    pub access_address: u32,
    pub llid: Llid,
    pub nesn: u8,
    pub sn: u8,
    pub md: bool,
    pub payload: Vec<u8>,
}

impl DataFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut header: u16 = self.llid.to_bits() as u16;
        if self.nesn & 1 != 0 {
            header |= 1 << 2;
        }
        if self.sn & 1 != 0 {
            header |= 1 << 3;
        }
        if self.md {
            header |= 1 << 4;
        }
        header |= (self.payload.len() as u16) << 8;
        let mut buf = Vec::with_capacity(6 + self.payload.len() + 3);
        buf.extend_from_slice(&self.access_address.to_le_bytes());
        buf.extend_from_slice(&header.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&[0u8; 3]);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < 6 {
            return Err(FrameError::ShortFrame);
        }
        let access_address = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let header = u16::from_le_bytes([buf[4], buf[5]]);
        let length = (header >> 8) as usize;
        if length + 6 > buf.len() {
            return Err(FrameError::ShortFrame);
        }
        Ok(Self {
            access_address,
            llid: Llid::from_bits(header as u8),
            nesn: ((header >> 2) & 1) as u8,
            sn: ((header >> 3) & 1) as u8,
            md: (header >> 4) & 1 != 0,
            payload: buf[6..6 + length].to_vec(),
        })
    }
}

/// `CONNECT_IND` LLData block, 34 bytes (spec §4.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectIndData {
    pub init_addr: [u8; 6],
    pub adv_addr: [u8; 6],
    pub access_address: u32,
    pub crc_init: u32,
    pub win_size: u8,
    pub win_offset: u16,
    pub interval: u16,
    pub latency: u16,
    pub timeout: u16,
    pub channel_map: [u8; 5],
    pub hop_increment: u8,
    pub sca: u8,
}

pub const CONNECT_IND_LEN: usize = 34;

impl ConnectIndData {
    pub fn encode(&self) -> [u8; CONNECT_IND_LEN] {
        let mut buf = [0u8; CONNECT_IND_LEN];
        buf[0..6].copy_from_slice(&self.init_addr);
        buf[6..12].copy_from_slice(&self.adv_addr);
        buf[12..16].copy_from_slice(&self.access_address.to_le_bytes());
        buf[16..19].copy_from_slice(&self.crc_init.to_le_bytes()[0..3]);
        buf[19] = self.win_size;
        buf[20..22].copy_from_slice(&self.win_offset.to_le_bytes());
        buf[22..24].copy_from_slice(&self.interval.to_le_bytes());
        buf[24..26].copy_from_slice(&self.latency.to_le_bytes());
        buf[26..28].copy_from_slice(&self.timeout.to_le_bytes());
        buf[28..33].copy_from_slice(&self.channel_map);
        buf[33] = (self.hop_increment & 0x1F) | (self.sca << 5);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < CONNECT_IND_LEN {
            return Err(FrameError::ShortFrame);
        }
        let mut init_addr = [0u8; 6];
        init_addr.copy_from_slice(&buf[0..6]);
        let mut adv_addr = [0u8; 6];
        adv_addr.copy_from_slice(&buf[6..12]);
        let access_address = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let crc_init = u32::from_le_bytes([buf[16], buf[17], buf[18], 0]);
        let win_size = buf[19];
        let win_offset = u16::from_le_bytes([buf[20], buf[21]]);
        let interval = u16::from_le_bytes([buf[22], buf[23]]);
        let latency = u16::from_le_bytes([buf[24], buf[25]]);
        let timeout = u16::from_le_bytes([buf[26], buf[27]]);
        let mut channel_map = [0u8; 5];
        channel_map.copy_from_slice(&buf[28..33]);
        let hop_sca = buf[33];
        Ok(Self {
            init_addr,
            adv_addr,
            access_address,
            crc_init,
            win_size,
            win_offset,
            interval,
            latency,
            timeout,
            channel_map,
            hop_increment: hop_sca & 0x1F,
            sca: hop_sca >> 5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_frame_round_trip() {
        let frame = UdpFrame::new(FrameDirection::SimToBridge, 37, vec![0xAA, 0xBB, 0xCC]);
        let encoded = frame.encode();
        let decoded = UdpFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn udp_frame_rejects_short_header() {
        assert_eq!(
            UdpFrame::decode(&[0x01, 0x25, 0x00]),
            Err(FrameError::MalformedFrame("frame shorter than header"))
        );
    }

    #[test]
    fn udp_frame_rejects_truncated_payload() {
        let buf = [0x01, 0x25, 0x05, 0x00, 0xAA];
        assert!(matches!(
            UdpFrame::decode(&buf),
            Err(FrameError::MalformedFrame(_))
        ));
    }

    #[test]
    fn adv_frame_round_trip_preserves_header_bits() {
        let frame = AdvFrame {
            access_address: ADVERTISING_ACCESS_ADDRESS,
            pdu_type: AdvPduType::ConnectInd,
            tx_add: true,
            rx_add: false,
            payload: vec![1, 2, 3, 4],
        };
        let encoded = frame.encode();
        let decoded = AdvFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn adv_frame_rejects_short_frame() {
        assert_eq!(
            AdvFrame::decode(&[0xD6, 0xBE, 0x89, 0x8E, 0x00]),
            Err(FrameError::ShortFrame)
        );
    }

    #[test]
    fn data_frame_round_trip() {
        let frame = DataFrame {
            access_address: 0x1234_5678,
            llid: Llid::Start,
            nesn: 1,
            sn: 0,
            md: false,
            payload: vec![0xAA, 0xBB, 0xCC, 0xDD],
        };
        let encoded = frame.encode();
        let decoded = DataFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn connect_ind_round_trip_is_byte_exact() {
        let data = ConnectIndData {
            init_addr: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            adv_addr: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
            access_address: 0xDEAD_BEEF,
            crc_init: 0x00_5544_33 & 0x00FF_FFFF,
            win_size: 1,
            win_offset: 0,
            interval: 0x0018,
            latency: 0,
            timeout: 0x00C8,
            channel_map: [0xFF, 0xFF, 0xFF, 0xFF, 0x1F],
            hop_increment: 12,
            sca: 0,
        };
        let encoded = data.encode();
        assert_eq!(encoded.len(), CONNECT_IND_LEN);
        let decoded = ConnectIndData::decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }
}
