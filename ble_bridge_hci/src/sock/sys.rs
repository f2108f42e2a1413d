//! Excerpt from `bluer`'s socket layer, trimmed to what a raw HCI socket
//! needs: https://github.com/bluez/bluer/blob/master/bluer/src/sock/sys.rs

use libc::sa_family_t;

pub const BTPROTO_HCI: i32 = 1;

/// `SOL_HCI` socket option level (see `bluetooth/hci.h`).
pub const SOL_HCI: i32 = 0;
/// `HCI_FILTER` socket option name.
pub const HCI_FILTER: i32 = 2;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct sockaddr_hci {
    pub hci_family: sa_family_t,
    pub hci_dev: u16,
    pub hci_channel: u16,
}

/// Mirrors the kernel's `struct hci_filter`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_filter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
}
