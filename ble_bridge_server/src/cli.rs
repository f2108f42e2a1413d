//! Command-line surface (spec §6 CLI).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ble-bridge-server", about = "BLE link-layer <-> HCI bridge")]
pub struct Cli {
    /// UDP port the bridge listens on for frames from the simulator.
    #[arg(long, default_value_t = 5001)]
    pub rx_port: u16,

    /// UDP port the simulator listens on for frames from the bridge.
    #[arg(long, default_value_t = 5000)]
    pub tx_port: u16,

    /// Bluetooth adapter to use (e.g. `hci0`); defaults to the host's
    /// default adapter.
    #[arg(long)]
    pub adapter: Option<String>,

    /// Run without touching the host Bluetooth stack at all.
    #[arg(long)]
    pub dry_run: bool,

    /// Use the raw HCI command path instead of BlueZ's object-manager
    /// advertising registration.
    #[arg(long)]
    pub no_object_manager: bool,

    /// Treat a failure to bind UDP or acquire the host transport as fatal
    /// instead of falling back to dry-run mode (spec §7 FatalInitError).
    #[arg(long)]
    pub no_fallback: bool,
}
