//! Callback contracts of the terminal SDK.
//!
//! The SDK is callback-driven: every imperative entry point on
//! [`TerminalSdk`] returns immediately and reports its outcome later through
//! one of the listener or callback objects handed to it. Events are delivered
//! sequentially from the SDK's own worker context.
//!
//! All traits are object-safe and `Send + Sync`, since the SDK stores the
//! objects it is given and invokes them from another thread.
//!
//! # Examples
//!
//! Listening for reader prompts while connecting:
//!
//! ```
//! use readerlink_core::{Reader, ReaderDisplayMessage};
//! use readerlink_terminal::error::TerminalError;
//! use readerlink_terminal::traits::{ReaderCallback, ReaderListener};
//!
//! struct PrintPrompts;
//!
//! impl ReaderListener for PrintPrompts {
//!     fn on_request_reader_display_message(&self, message: ReaderDisplayMessage) {
//!         println!("reader says: {message}");
//!     }
//! }
//!
//! struct PrintOutcome;
//!
//! impl ReaderCallback for PrintOutcome {
//!     fn on_success(&self, reader: Reader) {
//!         println!("connected to {reader}");
//!     }
//!
//!     fn on_failure(&self, error: TerminalError) {
//!         println!("connect failed: {error}");
//!     }
//! }
//! ```

use crate::error::TerminalError;
use crate::types::{
    ConnectionConfiguration, ConnectionStatus, DiscoveryConfiguration, ReaderSoftwareUpdate,
};
use readerlink_core::{Reader, ReaderDisplayMessage, ReaderInputOption};
use std::sync::Arc;

/// Outcome of an operation that produces no value.
///
/// The SDK invokes exactly one of the two methods, once.
pub trait Callback: Send + Sync {
    fn on_success(&self);

    fn on_failure(&self, error: TerminalError);
}

/// Outcome of an operation that produces a reader.
pub trait ReaderCallback: Send + Sync {
    fn on_success(&self, reader: Reader);

    fn on_failure(&self, error: TerminalError);
}

/// Handle to an in-flight SDK operation that may be aborted.
pub trait Cancelable: Send + Sync {
    /// Ask the SDK to abort the operation. `callback` reports whether the
    /// cancel request itself succeeded.
    fn cancel(&self, callback: Box<dyn Callback>);

    /// Check if the operation already finished, in which case canceling fails.
    fn is_completed(&self) -> bool;
}

/// Receives reader lists during a discovery scan.
pub trait DiscoveryListener: Send + Sync {
    /// Called with the full set of readers currently in range. Each call
    /// replaces the previous list.
    fn on_update_discovered_readers(&self, readers: Vec<Reader>);
}

/// Receives link state changes for the whole SDK session.
pub trait TerminalListener: Send + Sync {
    fn on_connection_status_change(&self, status: ConnectionStatus);

    /// The link to `reader` dropped without the application asking for it.
    fn on_unexpected_reader_disconnect(&self, reader: Reader);
}

/// Receives events originating from a connected reader.
///
/// Every method has an empty default so implementors only override the
/// events they care about.
#[allow(unused_variables)]
pub trait ReaderListener: Send + Sync {
    /// Installation began. `cancelable` aborts it.
    fn on_start_installing_update(&self, update: ReaderSoftwareUpdate, cancelable: Box<dyn Cancelable>) {}

    /// Installation progress as a fraction in `0.0..=1.0`.
    fn on_report_reader_software_update_progress(&self, progress: f32) {}

    /// Installation ended; `error` is `None` on success.
    fn on_finish_installing_update(
        &self,
        update: Option<ReaderSoftwareUpdate>,
        error: Option<TerminalError>,
    ) {
    }

    /// The reader has a firmware update waiting to be installed.
    fn on_report_available_update(&self, update: ReaderSoftwareUpdate) {}

    fn on_report_low_battery_warning(&self) {}

    fn on_request_reader_display_message(&self, message: ReaderDisplayMessage) {}

    fn on_request_reader_input(&self, options: Vec<ReaderInputOption>) {}
}

/// Imperative entry points of the terminal SDK.
///
/// There is exactly one live SDK session per process.
pub trait TerminalSdk: Send + Sync + 'static {
    /// Register the session-wide link listener, replacing any previous one.
    fn set_terminal_listener(&self, listener: Arc<dyn TerminalListener>);

    /// Start a discovery scan.
    ///
    /// Reader lists go to `listener`; `callback` fires once when the scan
    /// ends. The returned handle stops the scan.
    fn discover_readers(
        &self,
        config: DiscoveryConfiguration,
        listener: Arc<dyn DiscoveryListener>,
        callback: Box<dyn Callback>,
    ) -> Box<dyn Cancelable>;

    /// Connect to a discovered reader over Bluetooth.
    ///
    /// Reader events for the session go to `listener`.
    fn connect_bluetooth_reader(
        &self,
        reader: Reader,
        config: ConnectionConfiguration,
        listener: Arc<dyn ReaderListener>,
        callback: Box<dyn ReaderCallback>,
    );

    /// Disconnect from the connected reader.
    fn disconnect_reader(&self, callback: Box<dyn Callback>);

    /// Reader the SDK is currently connected to.
    fn connected_reader(&self) -> Option<Reader>;

    /// Current link state.
    fn connection_status(&self) -> ConnectionStatus;

    /// Install the update last reported as available. Progress is reported
    /// through the connected reader's listener.
    fn install_available_update(&self);
}
