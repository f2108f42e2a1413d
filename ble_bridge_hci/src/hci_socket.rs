//! Raw HCI socket: the host-facing half of the bridge when using the raw
//! transport backend (spec §4.6, §6). Reads admit events and ACL data only,
//! via the packet-type/event-code filter described in spec §6.

use crate::error::{Error, Result};
use crate::sock::hci::{Datagram, Filter, SocketAddr};

const MAX_HCI_PACKET_SIZE: usize = 1024;

/// A bound, filtered `BTPROTO_HCI` datagram socket.
#[derive(Debug)]
pub struct HciSocket {
    sock: Datagram,
}

impl HciSocket {
    /// Binds to the adapter identified by `dev_id` (the numeric suffix of
    /// `hciN`) and installs the events+ACL filter.
    pub async fn bind(dev_id: u16) -> Result<Self> {
        let sock = Datagram::bind(SocketAddr::new(dev_id))
            .await
            .map_err(Error::Hci)?;
        sock.set_filter(Filter::events_and_acl()).map_err(Error::Hci)?;
        Ok(Self { sock })
    }

    /// Reads one raw HCI packet (leading packet-type byte included).
    pub async fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_HCI_PACKET_SIZE];
        let n = self.sock.recv(&mut buf).await.map_err(Error::Hci)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes a raw HCI packet (command or ACL data, packet-type byte
    /// included) to the host controller.
    pub async fn send(&self, packet: &[u8]) -> Result<()> {
        self.sock.send(packet).await.map_err(Error::Hci)?;
        Ok(())
    }
}
