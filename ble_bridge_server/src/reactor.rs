//! The event loop (spec §4.8, §5): a cooperative, single-threaded
//! multiplexer over the simulator UDP socket and the host-transport
//! descriptor.

use ble_bridge_core::advertising::AdvertisingIngress;
use ble_bridge_core::frame::{AdvFrame, AdvPduType, DataFrame, UdpFrame, ADVERTISING_ACCESS_ADDRESS};
use ble_bridge_core::hci_event::{HciEvent, HciPacket};
use ble_bridge_core::translate::{SimPduOutcome, TranslationCore};
use ble_bridge_device::HostTransport;
use ble_bridge_hci::SimTransport;
use ble_bridge_shared::Shutdown;
use rand::rngs::StdRng;
use tracing::{debug, warn};

/// Advertising PDU types whose payload carries `[adv_addr(6), AD data...]`
/// and should be fed to the advertising ingress (spec §4.5). `ConnectInd`
/// never arrives from the simulator (the bridge only ever sends it), and
/// `ScanReq` carries no AD data.
fn carries_advertising_data(pdu_type: &AdvPduType) -> bool {
    matches!(
        pdu_type,
        AdvPduType::AdvInd
            | AdvPduType::AdvDirectInd
            | AdvPduType::AdvNonconnInd
            | AdvPduType::AdvScanInd
            | AdvPduType::ScanRsp
    )
}

/// Owns every resource the loop touches: the connection table (inside
/// `core`), the advertising dedup state, both transports, and the shutdown
/// signal (spec §9 "Global state").
pub struct Bridge {
    core: TranslationCore<StdRng>,
    ingress: AdvertisingIngress,
    sim: SimTransport,
    host: Box<dyn HostTransport>,
    shutdown: Shutdown,
}

impl Bridge {
    pub fn new(
        core: TranslationCore<StdRng>,
        sim: SimTransport,
        host: Box<dyn HostTransport>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            core,
            ingress: AdvertisingIngress::new(),
            sim,
            host,
            shutdown,
        }
    }

    /// Runs until shutdown is signaled, draining pending work and
    /// instructing the host-stack collaborator to deregister advertising
    /// before returning (spec §4.8).
    #[tracing::instrument(target = "server", skip(self))]
    pub async fn run(mut self) {
        let _shutdown_guard = self.shutdown.drop_guard();
        let mut host_events = self.host.receive_event_stream();
        let mut sim_buf = vec![0u8; ble_bridge_hci::MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.recv_shutdown() => {
                    debug!("shutdown signal received, draining and exiting");
                    break;
                }

                result = self.sim.recv(&mut sim_buf) => {
                    match result {
                        Ok(len) => self.handle_sim_frame(&sim_buf[..len]).await,
                        Err(err) => warn!(%err, "simulator transport read failed"),
                    }
                }

                packet = host_events.recv() => {
                    match packet {
                        Some(packet) => self.handle_host_packet(packet).await,
                        None => {
                            warn!("host transport event stream closed");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(err) = self.host.shutdown().await {
            warn!(%err, "host transport shutdown failed");
        }
    }

    async fn handle_sim_frame(&mut self, raw: &[u8]) {
        let frame = match UdpFrame::decode(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping malformed udp frame from simulator");
                return;
            }
        };
        if frame.payload.len() < 4 {
            return;
        }
        let access_address =
            u32::from_le_bytes([frame.payload[0], frame.payload[1], frame.payload[2], frame.payload[3]]);

        if access_address == ADVERTISING_ACCESS_ADDRESS {
            self.handle_advertising_frame(&frame.payload).await;
        } else {
            self.handle_data_frame(access_address, &frame.payload).await;
        }
    }

    async fn handle_advertising_frame(&mut self, raw: &[u8]) {
        let adv = match AdvFrame::decode(raw) {
            Ok(adv) => adv,
            Err(err) => {
                warn!(%err, "dropping malformed advertising frame");
                return;
            }
        };
        if !carries_advertising_data(&adv.pdu_type) || adv.payload.len() < 6 {
            return;
        }
        let mut adv_addr = [0u8; 6];
        adv_addr.copy_from_slice(&adv.payload[0..6]);
        self.core
            .note_advertiser_address(adv_addr, adv.tx_add as u8);

        if let ble_bridge_core::advertising::IngestOutcome::Updated(descriptor) =
            self.ingress.ingest(&adv.payload[6..])
        {
            if let Err(err) = self.host.set_advertising_data(&descriptor).await {
                warn!(%err, "failed to register advertisement with the host stack");
            }
        }
    }

    async fn handle_data_frame(&mut self, access_address: u32, raw: &[u8]) {
        let data = match DataFrame::decode(raw) {
            Ok(data) => data,
            Err(err) => {
                warn!(%err, "dropping malformed ll data frame");
                return;
            }
        };
        match self.core.on_sim_data_pdu(access_address, &data) {
            SimPduOutcome::Forward(acl_packet) => {
                if let Err(err) = self.host.send_acl(&acl_packet).await {
                    warn!(%err, "failed to forward acl data to host transport");
                }
            }
            SimPduOutcome::Terminated(reply) => {
                if let Some(frame) = reply {
                    self.send_to_sim(frame).await;
                }
            }
            SimPduOutcome::Dropped => {}
        }
    }

    async fn handle_host_packet(&mut self, packet: HciPacket) {
        match packet {
            HciPacket::Event(HciEvent::LeConnectionComplete(event)) => {
                match self.core.on_connection_complete(event) {
                    Ok(frame) => self.send_to_sim(frame).await,
                    Err(err) => warn!(%err, "failed to synthesize connect_ind"),
                }
            }
            HciPacket::Event(HciEvent::DisconnectionComplete(event)) => {
                if let Some(frame) = self.core.on_termination(event.handle) {
                    self.send_to_sim(frame).await;
                }
            }
            HciPacket::Event(HciEvent::Other) => {}
            HciPacket::Acl(acl) => {
                if let Some(frame) = self.core.on_host_acl(&acl) {
                    self.send_to_sim(frame).await;
                }
            }
        }
    }

    async fn send_to_sim(&self, frame: UdpFrame) {
        if let Err(err) = self.sim.send(&frame.encode()).await {
            warn!(%err, "failed to send frame to simulator");
        }
    }
}
