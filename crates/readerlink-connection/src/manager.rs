//! Connection manager facade.
//!
//! [`ConnectionManager`] is the only entry point callers need. It owns the
//! vendor listeners and exposes two kinds of API:
//!
//! - **Single-shot operations** (`connect`, `disconnect`): one vendor
//!   callback, one outcome. Each suspends once until the vendor resolves it
//!   and yields `true` on success or `false` on a vendor-reported failure.
//! - **Replayed state** (`reader_status`, `software_update_status`,
//!   `software_update_availability`): `watch` receivers that start at the
//!   current value and then follow every transition.
//!
//! Discovery is a stream per scan, and reader prompts go through a
//! single-observer channel.
//!
//! # Examples
//!
//! ```
//! use futures::StreamExt;
//! use readerlink_connection::ConnectionManager;
//! use readerlink_core::{DiscoveryEvent, Reader, ReaderType};
//! use readerlink_terminal::mock::MockTerminal;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> readerlink_connection::Result<()> {
//! let (terminal, handle) = MockTerminal::new();
//! let manager = ConnectionManager::new(Arc::new(terminal));
//!
//! let mut discovery = manager.discover_readers(true);
//! assert_eq!(discovery.next().await, Some(DiscoveryEvent::Started));
//!
//! let reader = Reader::new("CHB204909005931", ReaderType::Chipper2X)?
//!     .with_location_id("tml_1234");
//! handle.report_readers(vec![reader.clone()]);
//! handle.complete_discovery();
//!
//! let (connected, _) = tokio::join!(manager.connect(&reader), handle.accept_connect());
//! assert!(connected?);
//! assert!(manager.reader_status().borrow().is_connected());
//! # Ok(())
//! # }
//! ```

use crate::bridge::{ConnectCallback, DisconnectCallback, InFlight, single_shot};
use crate::discovery::{DiscoverReadersAction, DiscoverySession};
use crate::error::{ConnectionError, Result};
use crate::messages::{ReaderMessageChannel, ReaderPromptReceiver};
use crate::reader_listener::ReaderEventListener;
use crate::status_listener::ConnectionStatusListener;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::Map;
use readerlink_core::{
    DiscoveryEvent, DiscoveryStatus, Reader, ReaderPrompt, ReaderStatus,
    SoftwareUpdateAvailability, SoftwareUpdateStatus,
};
use readerlink_terminal::{ConnectionConfiguration, ReaderListener, TerminalListener, TerminalSdk};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Stream returned by [`ConnectionManager::discover_readers`].
///
/// Dropping it cancels the scan if it has not finished.
pub type DiscoveryEvents = Map<DiscoverySession, fn(DiscoveryStatus) -> DiscoveryEvent>;

/// Configuration for the connection manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionManagerConfig {
    /// Scan timeout handed to the vendor. `None` scans until canceled.
    pub discovery_timeout: Option<Duration>,
}

/// Orchestrates discovery, connection and firmware updates of one reader.
pub struct ConnectionManager<T: TerminalSdk> {
    terminal: Arc<T>,
    discovery: DiscoverReadersAction<T>,
    status_listener: Arc<ConnectionStatusListener<T>>,
    reader_listener: Arc<ReaderEventListener<T>>,
    messages: Arc<ReaderMessageChannel>,
    in_flight: InFlight,
}

impl<T: TerminalSdk> ConnectionManager<T> {
    /// Create a manager with the default configuration.
    ///
    /// Registers the manager's link listener on `terminal`.
    pub fn new(terminal: Arc<T>) -> Self {
        Self::with_config(terminal, ConnectionManagerConfig::default())
    }

    /// Create a manager with a custom configuration.
    pub fn with_config(terminal: Arc<T>, config: ConnectionManagerConfig) -> Self {
        let messages = Arc::new(ReaderMessageChannel::new());
        let reader_listener = Arc::new(ReaderEventListener::new(
            Arc::downgrade(&terminal),
            Arc::clone(&messages),
        ));
        let status_listener = Arc::new(ConnectionStatusListener::new(
            Arc::downgrade(&terminal),
            Arc::clone(&reader_listener),
        ));

        terminal.set_terminal_listener(Arc::clone(&status_listener) as Arc<dyn TerminalListener>);

        let discovery = DiscoverReadersAction::new(Arc::clone(&terminal))
            .with_timeout(config.discovery_timeout);

        Self {
            terminal,
            discovery,
            status_listener,
            reader_listener,
            messages,
            in_flight: InFlight::default(),
        }
    }

    /// Start a discovery scan.
    pub fn discover_readers(&self, simulated: bool) -> DiscoveryEvents {
        self.discovery
            .discover(simulated)
            .map(DiscoveryEvent::from as fn(DiscoveryStatus) -> DiscoveryEvent)
    }

    /// Connect to `reader` and wait for the vendor's answer.
    ///
    /// Returns `Ok(true)` once the vendor confirms the connection and
    /// `Ok(false)` when it reports a failure. The vendor offers no way to
    /// stop a connect attempt: dropping the returned future stops waiting,
    /// but the attempt keeps the single-flight slot until the vendor answers.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::MissingLocation`] if the reader has no location
    ///   binding, or only a blank one. The vendor is not called.
    /// - [`ConnectionError::OperationInProgress`] if another connect or
    ///   disconnect is still waiting.
    /// - [`ConnectionError::CallbackDropped`] if the vendor never answers.
    pub async fn connect(&self, reader: &Reader) -> Result<bool> {
        let Some(location_id) = reader.location().map(String::from) else {
            warn!(reader = %reader.id, "Refusing to connect to a reader without a location");
            return Err(ConnectionError::missing_location(&reader.id));
        };

        let in_flight = self.in_flight.begin("connect")?;

        if self.reader_listener.current_update_status().is_in_progress() {
            warn!(reader = %reader.id, "Connecting while a firmware update is in progress");
        }

        info!(reader = %reader.id, location = %location_id, "Connecting to reader");
        let (outcome, pending) = single_shot("connect");
        self.terminal.connect_bluetooth_reader(
            reader.clone(),
            ConnectionConfiguration::new(location_id),
            Arc::clone(&self.reader_listener) as Arc<dyn ReaderListener>,
            Box::new(ConnectCallback {
                outcome: outcome.holding(in_flight),
            }),
        );

        pending.wait().await
    }

    /// Disconnect from the current reader and wait for the vendor's answer.
    ///
    /// On success the last reader prompt is cleared with
    /// [`ReaderPrompt::NoMessage`].
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect), minus the location check.
    pub async fn disconnect(&self) -> Result<bool> {
        let in_flight = self.in_flight.begin("disconnect")?;

        info!("Disconnecting from reader");
        let (outcome, pending) = single_shot("disconnect");
        self.terminal.disconnect_reader(Box::new(DisconnectCallback {
            outcome: outcome.holding(in_flight),
        }));

        let disconnected = pending.wait().await?;
        if disconnected {
            self.messages.publish(ReaderPrompt::NoMessage);
        }
        Ok(disconnected)
    }

    /// Reader status, current value first.
    pub fn reader_status(&self) -> watch::Receiver<ReaderStatus> {
        self.status_listener.subscribe()
    }

    /// Firmware update status, current value first.
    pub fn software_update_status(&self) -> watch::Receiver<SoftwareUpdateStatus> {
        self.reader_listener.update_status()
    }

    /// Firmware update availability, current value first.
    pub fn software_update_availability(&self) -> watch::Receiver<SoftwareUpdateAvailability> {
        self.reader_listener.availability()
    }

    /// Register as the reader prompt observer, replacing any previous one.
    pub fn subscribe_prompts(&self) -> ReaderPromptReceiver {
        self.messages.subscribe()
    }

    /// Drop the current prompt observer; its receiver ends.
    pub fn unsubscribe_prompts(&self) {
        self.messages.unsubscribe();
    }

    /// Reader the vendor reports as connected.
    pub fn connected_reader(&self) -> Option<Reader> {
        self.terminal.connected_reader()
    }

    /// Battery level of the connected reader, as a fraction.
    pub fn battery_level(&self) -> Option<f32> {
        self.connected_reader()?.battery_level
    }

    /// When the current connection was confirmed.
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        self.status_listener.connected_since()
    }

    /// Ask the vendor to install the available firmware update.
    ///
    /// Starts a new update attempt: the status is reset to `Unknown` and then
    /// follows the vendor's progress reports. Returns `Ok(false)` without
    /// calling the vendor when no update is available or one is already
    /// being installed.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] if no reader is connected.
    pub fn install_software_update(&self) -> Result<bool> {
        if !self.status_listener.current().is_connected() {
            return Err(ConnectionError::NotConnected);
        }

        if self.reader_listener.current_availability() != SoftwareUpdateAvailability::Available {
            info!("No reader update available");
            return Ok(false);
        }

        if self.reader_listener.current_update_status().is_in_progress() {
            info!("Reader update already being installed");
            return Ok(false);
        }

        info!("Installing reader update");
        self.reader_listener.reset_update_status();
        self.terminal.install_available_update();
        Ok(true)
    }

    /// Abort the firmware installation in progress.
    ///
    /// Returns `false` when nothing is being installed.
    pub fn cancel_software_update(&self) -> bool {
        self.reader_listener.cancel_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readerlink_core::ReaderType;
    use readerlink_terminal::mock::{MockTerminal, MockTerminalHandle};

    fn manager() -> (ConnectionManager<MockTerminal>, MockTerminalHandle) {
        let (terminal, handle) = MockTerminal::new();
        (ConnectionManager::new(Arc::new(terminal)), handle)
    }

    fn located_reader() -> Reader {
        Reader::new("WPC323", ReaderType::WisePad3)
            .unwrap()
            .with_location_id("tml_1")
    }

    #[tokio::test]
    async fn test_connect_without_location_makes_no_vendor_call() {
        let (manager, handle) = manager();
        let reader = Reader::new("WPC323", ReaderType::WisePad3).unwrap();

        let result = manager.connect(&reader).await;

        assert_eq!(result, Err(ConnectionError::missing_location("WPC323")));
        assert_eq!(handle.counts().total(), 0);
        assert_eq!(*manager.reader_status().borrow(), ReaderStatus::NotConnected);
    }

    #[tokio::test]
    async fn test_connect_with_blank_location_makes_no_vendor_call() {
        let (manager, handle) = manager();
        let reader = Reader::new("WPC323", ReaderType::WisePad3)
            .unwrap()
            .with_location_id("  ");

        let result = manager.connect(&reader).await;

        assert_eq!(result, Err(ConnectionError::missing_location("WPC323")));
        assert_eq!(handle.counts().connect, 0);
    }

    #[tokio::test]
    async fn test_connect_passes_location_to_vendor() {
        let (manager, handle) = manager();
        let reader = located_reader();

        let (connected, _) = tokio::join!(manager.connect(&reader), handle.accept_connect());

        assert_eq!(connected, Ok(true));
        assert_eq!(
            handle.last_connection_config(),
            Some(ConnectionConfiguration::new("tml_1"))
        );
        assert!(manager.connected_since().is_some());
    }

    #[tokio::test]
    async fn test_install_requires_connection() {
        let (manager, handle) = manager();

        assert_eq!(
            manager.install_software_update(),
            Err(ConnectionError::NotConnected)
        );
        assert_eq!(handle.counts().install_update, 0);
    }

    #[tokio::test]
    async fn test_install_without_available_update() {
        let (manager, handle) = manager();
        let reader = located_reader();
        let _ = tokio::join!(manager.connect(&reader), handle.accept_connect());

        assert_eq!(manager.install_software_update(), Ok(false));
        assert_eq!(handle.counts().install_update, 0);
    }

    #[tokio::test]
    async fn test_battery_level_follows_vendor() {
        let (manager, handle) = manager();
        assert_eq!(manager.battery_level(), None);

        let reader = located_reader();
        let _ = tokio::join!(manager.connect(&reader), handle.accept_connect());
        handle.set_battery_level(Some(0.3));

        assert_eq!(manager.battery_level(), Some(0.3));
    }
}
