//! Per-connection state (spec §3) and the data-channel hop algorithm
//! (spec §4.3).

/// Number of BLE data channels.
pub const NUM_DATA_CHANNELS: u8 = 37;

/// A single active LL connection, keyed externally by `(conn_handle,
/// access_address)` (spec §3).
#[derive(Debug, Clone)]
pub struct Connection {
    pub conn_handle: u16,
    pub access_address: u32,
    pub crc_init: u32,
    pub init_addr: [u8; 6],
    pub init_addr_type: u8,
    pub adv_addr: [u8; 6],
    pub adv_addr_type: u8,
    pub interval: u16,
    pub latency: u16,
    pub timeout: u16,
    pub win_size: u8,
    pub win_offset: u16,
    pub channel_map: [u8; 5],
    pub hop_increment: u8,
    used_channels: Vec<u8>,
    pub current_channel: u8,
    pub event_counter: u32,
    pub tx_sn: u8,
    pub tx_nesn: u8,
    pub rx_sn: u8,
    pub is_connected: bool,
}

/// Parameters needed to create a new connection record (spec §4.7 step 3).
#[derive(Debug, Clone)]
pub struct NewConnectionParams {
    pub conn_handle: u16,
    pub access_address: u32,
    pub crc_init: u32,
    pub hop_increment: u8,
    pub init_addr: [u8; 6],
    pub init_addr_type: u8,
    pub adv_addr: [u8; 6],
    pub adv_addr_type: u8,
    pub interval: u16,
    pub latency: u16,
    pub timeout: u16,
}

impl Connection {
    /// Builds a connection record per spec §4.7 step 3: default channel map
    /// (all 37 channels), default window (size 1, offset 0), zeroed
    /// sequence numbers, `current_channel = 0`.
    pub fn new(params: NewConnectionParams) -> Self {
        let channel_map = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        Self {
            conn_handle: params.conn_handle,
            access_address: params.access_address,
            crc_init: params.crc_init,
            init_addr: params.init_addr,
            init_addr_type: params.init_addr_type,
            adv_addr: params.adv_addr,
            adv_addr_type: params.adv_addr_type,
            interval: params.interval,
            latency: params.latency,
            timeout: params.timeout,
            win_size: 1,
            win_offset: 0,
            channel_map,
            hop_increment: params.hop_increment,
            used_channels: used_channels_from_map(&channel_map),
            current_channel: 0,
            event_counter: 0,
            tx_sn: 0,
            tx_nesn: 0,
            rx_sn: 0,
            is_connected: true,
        }
    }

    pub fn used_channels(&self) -> &[u8] {
        &self.used_channels
    }

    /// Replaces the channel map and rebuilds `used_channels` (spec §3:
    /// non-empty invariant, falls back to `[0..37)` if the map is all zero).
    pub fn set_channel_map(&mut self, channel_map: [u8; 5]) {
        self.channel_map = channel_map;
        self.used_channels = used_channels_from_map(&channel_map);
    }

    /// The BLE data-channel remapping rule, simplified for a single hop
    /// (spec §4.3): advances `current_channel`, increments `event_counter`,
    /// and returns the new channel.
    ///
    /// Invoked only from the host→sim data path (spec §4.7, §9 open
    /// question 1): the bridge does not track the simulator's air schedule,
    /// so this undercounts hops relative to a real LL implementation. That
    /// is an accepted simplification, not a bug.
    pub fn next_channel(&mut self) -> u8 {
        let candidate = (self.current_channel as u32 + self.hop_increment as u32)
            % NUM_DATA_CHANNELS as u32;
        let candidate = candidate as u8;
        let new_channel = if self.used_channels.contains(&candidate) {
            candidate
        } else {
            let len = self.used_channels.len();
            self.used_channels[candidate as usize % len]
        };
        self.current_channel = new_channel;
        self.event_counter += 1;
        new_channel
    }
}

fn used_channels_from_map(channel_map: &[u8; 5]) -> Vec<u8> {
    let mut channels: Vec<u8> = (0..NUM_DATA_CHANNELS)
        .filter(|&ch| {
            let byte = channel_map[(ch / 8) as usize];
            byte & (1 << (ch % 8)) != 0
        })
        .collect();
    if channels.is_empty() {
        channels = (0..NUM_DATA_CHANNELS).collect();
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection(hop_increment: u8) -> Connection {
        Connection::new(NewConnectionParams {
            conn_handle: 0x0040,
            access_address: 0xDEAD_BEEF,
            crc_init: 0x55_4433,
            hop_increment,
            init_addr: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            init_addr_type: 0,
            adv_addr: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
            adv_addr_type: 0,
            interval: 0x0018,
            latency: 0,
            timeout: 0x00C8,
        })
    }

    #[test]
    fn new_connection_has_all_channels_used_by_default() {
        let conn = test_connection(5);
        assert_eq!(conn.used_channels().len(), 37);
        assert_eq!(conn.current_channel, 0);
        assert_eq!(conn.event_counter, 0);
    }

    #[test]
    fn all_zero_channel_map_falls_back_to_full_range() {
        let mut conn = test_connection(5);
        conn.set_channel_map([0x00; 5]);
        assert_eq!(conn.used_channels().len(), 37);
    }

    #[test]
    fn next_channel_advances_by_hop_increment_when_candidate_is_used() {
        let mut conn = test_connection(5);
        assert_eq!(conn.next_channel(), 5);
        assert_eq!(conn.current_channel, 5);
        assert_eq!(conn.event_counter, 1);
        assert_eq!(conn.next_channel(), 10);
        assert_eq!(conn.event_counter, 2);
    }

    #[test]
    fn next_channel_remaps_through_used_channels_when_candidate_excluded() {
        let mut conn = test_connection(5);
        // Only channels 0 and 2 are usable.
        conn.set_channel_map([0b0000_0101, 0, 0, 0, 0]);
        // candidate = (0 + 5) % 37 = 5, not in {0, 2} -> used_channels[5 % 2] = used_channels[1] = 2
        assert_eq!(conn.next_channel(), 2);
    }
}
