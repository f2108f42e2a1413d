//! Framed UDP transport to the simulator (spec §5 "Shared resources": one
//! bound receive socket, one unconnected send socket).

use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

const MAX_FRAME_SIZE: usize = 2048;

/// The simulator-facing UDP link. `recv` reads whatever frame bytes arrive
/// on the bound receive socket; `send` writes to the simulator's receive
/// port over an unconnected send socket, matching the CLI's
/// `--recv-port`/`--send-port` pair (spec §6).
#[derive(Debug)]
pub struct SimTransport {
    recv_sock: UdpSocket,
    send_sock: UdpSocket,
    sim_addr: SocketAddr,
}

impl SimTransport {
    /// Binds the receive socket to `0.0.0.0:recv_port` and an ephemeral send
    /// socket, targeting `sim_addr` (typically `127.0.0.1:send_port`) for
    /// every outgoing frame.
    pub async fn bind(recv_port: u16, sim_addr: SocketAddr) -> Result<Self> {
        let recv_sock = UdpSocket::bind(("0.0.0.0", recv_port))
            .await
            .map_err(Error::Udp)?;
        let send_sock = UdpSocket::bind(("0.0.0.0", 0)).await.map_err(Error::Udp)?;
        Ok(Self {
            recv_sock,
            send_sock,
            sim_addr,
        })
    }

    /// Reads one UDP datagram, i.e. one raw `UdpFrame` encoding, into `buf`
    /// and returns the number of bytes written.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let (len, _from) = self.recv_sock.recv_from(buf).await.map_err(Error::Udp)?;
        Ok(len)
    }

    /// Sends a pre-encoded `UdpFrame` to the simulator.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        self.send_sock
            .send_to(frame, self.sim_addr)
            .await
            .map_err(Error::Udp)?;
        Ok(())
    }
}

pub const MAX_DATAGRAM_SIZE: usize = MAX_FRAME_SIZE;
