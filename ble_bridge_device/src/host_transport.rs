//! The host-transport capability set (spec §9 "Polymorphism"): `{
//! set_advertising_data, send_acl, receive_event_stream, shutdown }`, with a
//! raw-HCI-socket implementor and a BlueZ object-manager implementor.
//!
//! Both backends read HCI events and ACL data off the same raw socket —
//! BlueZ's D-Bus API has no way to hand a custom bridge raw ACL traffic, so
//! the object-manager backend only differs in how it registers the
//! advertisement; everything downstream of that is shared.

use crate::adapter::Adapter;
use crate::advertisement::AdvertisementRegistrar;
use crate::command;
use crate::error::Result;
use async_trait::async_trait;
use ble_bridge_core::advertising::AdvertisementDescriptor;
use ble_bridge_core::hci_event::{HciPacket, HciParseError};
use ble_bridge_hci::HciSocket;
use std::sync::Arc;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The capability set the translation core's event loop depends on (spec
/// §9). The core never holds a concrete backend, only `dyn HostTransport`.
#[async_trait]
pub trait HostTransport: Send + Sync {
    async fn set_advertising_data(&self, descriptor: &AdvertisementDescriptor) -> Result<()>;
    /// `packet` is a fully-encoded HCI ACL data packet (leading `0x02` type
    /// byte included), as produced by `ble_bridge_core::hci_event::encode_acl`.
    async fn send_acl(&self, packet: &[u8]) -> Result<()>;
    /// Hands ownership of the inbound packet stream to the caller; callable
    /// once per transport instance.
    fn receive_event_stream(&mut self) -> mpsc::Receiver<HciPacket>;
    async fn shutdown(&self) -> Result<()>;
}

/// Spawns the shared background task that reads raw packets off `socket`,
/// parses them, and forwards well-formed ones to `tx`. Parse errors are
/// logged and dropped; a closed socket ends the task.
fn spawn_reader(socket: Arc<HciSocket>, tx: mpsc::Sender<HciPacket>) {
    tokio::spawn(async move {
        loop {
            let packet = match socket.recv().await {
                Ok(packet) => packet,
                Err(err) => {
                    tracing::warn!(target = "device", %err, "hci socket read failed");
                    break;
                }
            };
            match HciPacket::parse(&packet) {
                Ok(parsed) => {
                    if tx.send(parsed).await.is_err() {
                        break;
                    }
                }
                Err(HciParseError::UnknownPacketType(_)) => {
                    // HCI command-complete/status events share the socket on
                    // some kernels; not our concern, drop silently.
                }
                Err(err) => {
                    tracing::warn!(target = "device", %err, "dropping malformed hci packet");
                }
            }
        }
    });
}

/// Raw `AF_BLUETOOTH`/`BTPROTO_HCI` backend: advertising is driven directly
/// with `HCI_LE_Set_Advertising_*` commands (spec §6 raw transport).
pub struct RawTransport {
    socket: Arc<HciSocket>,
    events_rx: Option<mpsc::Receiver<HciPacket>>,
}

impl RawTransport {
    pub async fn bind(adapter: &Adapter) -> Result<Self> {
        let socket = Arc::new(HciSocket::bind(adapter.dev_id()?).await?);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        spawn_reader(socket.clone(), tx);
        Ok(Self {
            socket,
            events_rx: Some(rx),
        })
    }
}

#[async_trait]
impl HostTransport for RawTransport {
    #[tracing::instrument(target = "device", skip(self, descriptor))]
    async fn set_advertising_data(&self, descriptor: &AdvertisementDescriptor) -> Result<()> {
        self.socket
            .send(&command::set_advertising_parameters())
            .await?;
        self.socket.send(&command::set_advertising_data(descriptor)).await?;
        self.socket
            .send(&command::set_scan_response_data(descriptor))
            .await?;
        self.socket
            .send(&command::set_advertising_enable(true))
            .await?;
        Ok(())
    }

    async fn send_acl(&self, packet: &[u8]) -> Result<()> {
        self.socket.send(packet).await?;
        Ok(())
    }

    fn receive_event_stream(&mut self) -> mpsc::Receiver<HciPacket> {
        self.events_rx.take().expect("event stream already taken")
    }

    async fn shutdown(&self) -> Result<()> {
        self.socket.send(&command::set_advertising_enable(false)).await?;
        Ok(())
    }
}

/// BlueZ D-Bus object-manager backend: advertising is registered as an
/// `LEAdvertisement1` object; ACL/event I/O still rides the raw socket
/// (spec §6 high-level host-stack interface).
pub struct ObjectManagerTransport {
    socket: Arc<HciSocket>,
    events_rx: Option<mpsc::Receiver<HciPacket>>,
    registrar: tokio::sync::Mutex<AdvertisementRegistrar>,
    adapter: Arc<Adapter>,
}

impl ObjectManagerTransport {
    pub async fn bind(adapter: Arc<Adapter>) -> Result<Self> {
        let socket = Arc::new(HciSocket::bind(adapter.dev_id()?).await?);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        spawn_reader(socket.clone(), tx);
        Ok(Self {
            socket,
            events_rx: Some(rx),
            registrar: tokio::sync::Mutex::new(AdvertisementRegistrar::new()),
            adapter,
        })
    }
}

#[async_trait]
impl HostTransport for ObjectManagerTransport {
    #[tracing::instrument(target = "device", skip(self, descriptor))]
    async fn set_advertising_data(&self, descriptor: &AdvertisementDescriptor) -> Result<()> {
        let mut registrar = self.registrar.lock().await;
        registrar.update(&self.adapter, descriptor).await
    }

    async fn send_acl(&self, packet: &[u8]) -> Result<()> {
        self.socket.send(packet).await?;
        Ok(())
    }

    fn receive_event_stream(&mut self) -> mpsc::Receiver<HciPacket> {
        self.events_rx.take().expect("event stream already taken")
    }

    async fn shutdown(&self) -> Result<()> {
        self.registrar.lock().await.deregister();
        Ok(())
    }
}
