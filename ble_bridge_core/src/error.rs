use thiserror::Error;

/// Errors raised while decoding the UDP frame wrapper or an LL PDU layout
/// carried inside it.
#[derive(Clone, Error, Debug, Eq, PartialEq)]
pub enum FrameError {
    #[error("udp frame is malformed: {0}")]
    MalformedFrame(&'static str),
    #[error("ll pdu frame is shorter than its declared length")]
    ShortFrame,
}

/// Errors raised by [`crate::table::ConnectionTable`] operations.
#[derive(Clone, Error, Debug, Eq, PartialEq)]
pub enum TableError {
    #[error("connection handle {0:#06x} is already registered")]
    DuplicateHandle(u16),
}

/// Errors raised by the translation-core procedures in [`crate::translate`].
#[derive(Clone, Error, Debug, Eq, PartialEq)]
pub enum TranslateError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Table(#[from] TableError),
}
