use std::time::Duration;

use thiserror::Error;

/// An error produced by the link.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// No complete frame arrived in time.
    #[error("No message received within {0:?}")]
    Timeout(Duration),
    /// The connection was lost while sending or receiving.
    #[error("Disconnected from host: {0}")]
    Disconnected(String),
    /// The link is already closed.
    #[error("Connection is closed")]
    ConnectionClosed,
    /// A frame could not be encoded or decoded.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

impl TransportError {
    /// Returns `true` if the error leaves the link unusable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Disconnected(_) | TransportError::InvalidFrame(_)
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match e.kind() {
            WouldBlock | TimedOut => TransportError::Timeout(Duration::ZERO),
            _ => TransportError::Disconnected(e.to_string()),
        }
    }
}
