pub mod access_address;
pub mod addr;
pub mod advertising;
pub mod connection;
pub mod error;
pub mod frame;
pub mod hci_event;
pub mod table;
pub mod translate;

pub use addr::Address;
pub use connection::Connection;
pub use error::{FrameError, TableError, TranslateError};
pub use table::ConnectionTable;
pub use translate::TranslationCore;
