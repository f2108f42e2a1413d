mod cli;
mod reactor;

use anyhow::Context;
use ble_bridge_core::translate::TranslationCore;
use ble_bridge_device::{Adapter, AdapterConfig, ObjectManagerTransport, RawTransport};
use ble_bridge_hci::SimTransport;
use ble_bridge_shared::Shutdown;
use clap::Parser;
use rand::SeedableRng;
use reactor::Bridge;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::sync::mpsc;
use tracing::{error, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);
    // Retained until shutdown actually begins below, so the `WeakSender`
    // inside `Shutdown` has a live sender to upgrade from when `Bridge::run`
    // takes its drop-guard.
    let shutdown = Shutdown::new(shutdown_tx, shutdown_complete_tx.clone());

    let sim_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), cli.tx_port);
    let sim = SimTransport::bind(cli.rx_port, sim_addr)
        .await
        .context("failed to bind simulator udp transport")?;

    let host_transport = acquire_host_transport(&cli).await;
    let core = TranslationCore::new(rand::rngs::StdRng::from_entropy());
    let bridge = Bridge::new(core, sim, host_transport, shutdown.clone());

    let bridge_done = tokio::spawn(async move {
        bridge.run().await;
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("ctrl-c received, shutting down");
        }
        result = bridge_done => {
            if let Err(err) = result {
                error!(%err, "bridge task panicked");
            }
        }
    }

    drop(shutdown_rx);
    // Drop our own retained sender now that shutdown has begun; from here
    // the only thing keeping the channel open is `Bridge::run`'s drop-guard,
    // so this resolves once the bridge has actually finished draining.
    drop(shutdown_complete_tx);
    let _ = shutdown_complete_rx.recv().await;
    Ok(())
}

/// Acquires the host-transport collaborator, honoring `--dry-run` and the
/// fallback/fatal policy for initialization failures (spec §7
/// `FatalInitError`).
async fn acquire_host_transport(cli: &cli::Cli) -> Box<dyn ble_bridge_device::HostTransport> {
    if cli.dry_run {
        return Box::new(DryRunTransport::default());
    }

    match open_live_transport(cli).await {
        Ok(transport) => transport,
        Err(err) => {
            if cli.no_fallback {
                error!(%err, "fatal: could not acquire host transport");
                std::process::exit(1);
            }
            warn!(%err, "could not acquire host transport, falling back to dry-run");
            Box::new(DryRunTransport::default())
        }
    }
}

async fn open_live_transport(
    cli: &cli::Cli,
) -> anyhow::Result<Box<dyn ble_bridge_device::HostTransport>> {
    let adapter = Adapter::open(AdapterConfig {
        name: cli.adapter.clone(),
    })
    .await
    .context("failed to open bluetooth adapter")?;
    adapter.set_powered(true).await.context("failed to power on adapter")?;

    if cli.no_object_manager {
        Ok(Box::new(
            RawTransport::bind(&adapter)
                .await
                .context("failed to bind raw hci transport")?,
        ))
    } else {
        Ok(Box::new(
            ObjectManagerTransport::bind(std::sync::Arc::new(adapter))
                .await
                .context("failed to bind object-manager transport")?,
        ))
    }
}

/// A host transport that discards everything, used for `--dry-run` and as
/// the fallback when live acquisition fails without `--no-fallback` (spec
/// §7 `FatalInitError` recovery policy).
///
/// Its event stream never closes: the sending half is parked in `self` so
/// the reactor's `host_events.recv()` arm simply never fires, which is the
/// whole point of a dry run.
#[derive(Default)]
struct DryRunTransport {
    _events_tx: std::sync::Mutex<Option<mpsc::Sender<ble_bridge_core::hci_event::HciPacket>>>,
}

#[async_trait::async_trait]
impl ble_bridge_device::HostTransport for DryRunTransport {
    async fn set_advertising_data(
        &self,
        _descriptor: &ble_bridge_core::advertising::AdvertisementDescriptor,
    ) -> ble_bridge_device::Result<()> {
        Ok(())
    }

    async fn send_acl(&self, _packet: &[u8]) -> ble_bridge_device::Result<()> {
        Ok(())
    }

    fn receive_event_stream(&mut self) -> mpsc::Receiver<ble_bridge_core::hci_event::HciPacket> {
        let (tx, rx) = mpsc::channel(1);
        *self._events_tx.lock().unwrap() = Some(tx);
        rx
    }

    async fn shutdown(&self) -> ble_bridge_device::Result<()> {
        Ok(())
    }
}
