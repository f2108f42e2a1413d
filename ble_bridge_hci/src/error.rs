use thiserror::Error;

/// Transport-layer errors (spec §7 `TransportError`): socket send/recv
/// failure on either the simulator UDP link or the host HCI socket.
#[derive(Debug, Error)]
pub enum Error {
    #[error("udp transport io error: {0}")]
    Udp(std::io::Error),
    #[error("hci socket io error: {0}")]
    Hci(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
