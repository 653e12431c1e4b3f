//! Error types for connection management.
//!
//! Vendor-reported failures of connect and disconnect are not errors here:
//! they resolve to `Ok(false)`. A [`ConnectionError`] means the request was
//! refused before reaching the vendor, or the vendor broke its callback
//! contract.

use thiserror::Error;

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// The reader is not bound to a location and cannot be connected.
    #[error("Reader {reader_id} has no location binding")]
    MissingLocation { reader_id: String },

    /// Another single-shot operation is still waiting for its callback.
    #[error("Cannot start {requested}: {in_flight} is still in progress")]
    OperationInProgress {
        requested: &'static str,
        in_flight: &'static str,
    },

    /// The vendor dropped a callback without resolving it.
    #[error("{operation} callback was dropped without a result")]
    CallbackDropped { operation: &'static str },

    /// The operation needs a connected reader.
    #[error("No reader is connected")]
    NotConnected,

    #[error(transparent)]
    Domain(#[from] readerlink_core::Error),
}

impl ConnectionError {
    /// Create a missing location error.
    pub fn missing_location(reader_id: impl Into<String>) -> Self {
        Self::MissingLocation {
            reader_id: reader_id.into(),
        }
    }

    /// Check if the request was refused before any vendor call was made.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingLocation { .. } | Self::OperationInProgress { .. } | Self::NotConnected
        )
    }
}
