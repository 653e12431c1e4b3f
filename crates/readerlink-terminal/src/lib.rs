//! Terminal SDK abstraction for card reader sessions.
//!
//! This crate describes the vendor terminal SDK that owns the Bluetooth
//! transport and firmware update mechanics of a card reader. The SDK is
//! callback-driven: requests return immediately and their outcomes arrive
//! later on listener and callback objects.
//!
//! # Contracts
//!
//! - [`TerminalSdk`]: imperative entry points (discover, connect,
//!   disconnect, install update, connected reader query).
//! - [`TerminalListener`]: session-wide link state changes.
//! - [`ReaderListener`]: events from the connected reader (update progress,
//!   low battery, customer prompts).
//! - [`DiscoveryListener`], [`Callback`], [`ReaderCallback`] and
//!   [`Cancelable`]: scan results, one-shot outcomes and abort handles.
//!
//! # Errors
//!
//! Failures arrive as a [`TerminalError`] carrying a [`TerminalErrorCode`].
//!
//! # Mock Implementation
//!
//! [`mock::MockTerminal`] implements the SDK for tests and for the
//! simulated mode of the command-line tool:
//!
//! ```
//! use readerlink_terminal::mock::{MockTerminal, SimulatedTerminalConfig};
//!
//! // Step-by-step control from tests
//! let (_terminal, handle) = MockTerminal::new();
//! assert_eq!(handle.counts().total(), 0);
//!
//! // Self-driving terminal
//! let config = SimulatedTerminalConfig::default();
//! assert_eq!(config.readers.len(), 2);
//! ```
//!
//! [`TerminalSdk`]: traits::TerminalSdk
//! [`TerminalListener`]: traits::TerminalListener
//! [`ReaderListener`]: traits::ReaderListener
//! [`DiscoveryListener`]: traits::DiscoveryListener
//! [`Callback`]: traits::Callback
//! [`ReaderCallback`]: traits::ReaderCallback
//! [`Cancelable`]: traits::Cancelable

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{TerminalError, TerminalErrorCode};
pub use traits::{
    Callback, Cancelable, DiscoveryListener, ReaderCallback, ReaderListener, TerminalListener,
    TerminalSdk,
};
pub use types::{
    ConnectionConfiguration, ConnectionStatus, DiscoveryConfiguration, ReaderSoftwareUpdate,
};
