use thiserror::Error;

/// Errors raised by the host-stack collaborator: adapter discovery,
/// advertising registration, and the two `HostTransport` backends (spec §7
/// `CollaboratorError`).
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no such bluetooth adapter: {0}")]
    NoSuchAdapter(String),
    #[error("failed to register advertisement with the host stack")]
    AdvertisingRegistrationFailed,
    #[error("raw hci transport error: {0}")]
    Hci(#[from] ble_bridge_hci::Error),
    #[error("bluez d-bus error: {0}")]
    Bluer(#[from] bluer::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
