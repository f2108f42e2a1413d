//! Host-stack collaborator: Bluetooth adapter discovery, advertisement
//! registration, and the two `HostTransport` backends the translation core
//! depends on through a capability trait (spec §1, §6, §9).

pub mod adapter;
pub mod advertisement;
pub mod command;
pub mod error;
pub mod host_transport;

pub use adapter::{Adapter, AdapterConfig};
pub use advertisement::AdvertisementRegistrar;
pub use error::{DeviceError, Result};
pub use host_transport::{HostTransport, ObjectManagerTransport, RawTransport};
