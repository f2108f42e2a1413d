//! A raw `AF_BLUETOOTH`/`BTPROTO_HCI` datagram socket: the wire to the host
//! controller for HCI commands, events, and ACL data (spec §4.6, §6).

use super::sys::{hci_filter, sockaddr_hci, BTPROTO_HCI, HCI_FILTER, SOL_HCI};
use super::{OwnedFd, SysSockAddr};
use libc::{AF_BLUETOOTH, O_NONBLOCK, SOCK_RAW};
use std::{
    fmt,
    io::Result,
    os::unix::io::{AsRawFd, RawFd},
    task::{Context, Poll},
};
use tokio::io::{unix::AsyncFd, ReadBuf};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketAddr {
    pub dev_id: u16,
}

impl SocketAddr {
    pub const fn new(dev_id: u16) -> Self {
        Self { dev_id }
    }
}

impl SysSockAddr for SocketAddr {
    type SysSockAddr = sockaddr_hci;

    fn into_sys_sock_addr(self) -> Self::SysSockAddr {
        sockaddr_hci {
            hci_family: AF_BLUETOOTH as _,
            hci_dev: self.dev_id,
            hci_channel: 0,
        }
    }

    fn try_from_sys_sock_addr(saddr: Self::SysSockAddr) -> Result<Self> {
        Ok(Self {
            dev_id: saddr.hci_dev,
        })
    }
}

/// A packet-type/event-code/opcode filter installed with `setsockopt`
/// (spec §6: "sets a packet-type/event-code filter that admits events and
/// ACL data").
#[derive(Debug, Default, Clone, Copy)]
pub struct Filter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
}

impl Filter {
    /// Admits HCI events (`0x04`) and ACL data (`0x02`), every event code.
    pub fn events_and_acl() -> Self {
        Self {
            type_mask: (1 << 0x04) | (1 << 0x02),
            event_mask: [0xFFFF_FFFF, 0xFFFF_FFFF],
            opcode: 0,
        }
    }

    fn into_sys(self) -> hci_filter {
        hci_filter {
            type_mask: self.type_mask,
            event_mask: self.event_mask,
            opcode: self.opcode,
        }
    }
}

/// Raw HCI datagram socket, always non-blocking and driven through
/// [`AsyncFd`].
pub struct Datagram {
    fd: AsyncFd<OwnedFd>,
}

impl fmt::Debug for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Datagram")
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

impl Datagram {
    pub async fn bind(sa: SocketAddr) -> Result<Self> {
        let owned = super::socket(AF_BLUETOOTH, SOCK_RAW, BTPROTO_HCI)?;
        let flags = super::fcntl_read(&owned)?;
        super::fcntl_write(&owned, flags | O_NONBLOCK)?;
        super::bind(&owned, sa)?;
        Ok(Self {
            fd: AsyncFd::new(owned)?,
        })
    }

    pub fn set_filter(&self, filter: Filter) -> Result<()> {
        super::setsockopt(self.fd.get_ref(), SOL_HCI, HCI_FILTER, &filter.into_sys())
    }

    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let mut buf = ReadBuf::new(buf);
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| super::recv(inner.get_ref(), &mut buf, 0)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    pub fn poll_recv(&self, cx: &mut Context, buf: &mut ReadBuf) -> Poll<Result<usize>> {
        loop {
            let mut guard = std::task::ready!(self.fd.poll_read_ready(cx))?;
            match guard.try_io(|inner| super::recv(inner.get_ref(), buf, 0)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    pub async fn send(&self, buf: &[u8]) -> Result<usize> {
        loop {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| super::send(inner.get_ref(), buf, 0)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for Datagram {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
