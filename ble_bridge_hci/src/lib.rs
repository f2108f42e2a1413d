//! Raw, transport-agnostic I/O for the bridge: a framed UDP socket to the
//! simulator and a raw `AF_BLUETOOTH`/`BTPROTO_HCI` socket to the host
//! controller (spec §2, §5, §6).
//!
//! Nothing in this crate understands LL PDUs or HCI event layouts; that
//! parsing lives in [`ble_bridge_core`]. This crate only moves bytes.

pub mod error;
pub mod hci_socket;
pub mod sock;
pub mod udp;

pub use error::{Error, Result};
pub use hci_socket::HciSocket;
pub use udp::{SimTransport, MAX_DATAGRAM_SIZE};
