//! Mock terminal SDK for testing and development.
//!
//! [`MockTerminal`] implements [`TerminalSdk`] without any radio. Every
//! operation is recorded and parked until the paired [`MockTerminalHandle`]
//! resolves it, so tests decide exactly when and how each vendor callback
//! fires. A terminal built with [`MockTerminal::simulated`] resolves the parked
//! operations on its own after the delays in its [`SimulatedTerminalConfig`].
//!
//! Callbacks are always invoked with the internal lock released, so listener
//! code may call back into the terminal.

use super::simulated::{self, SimulatedTerminalConfig};
use crate::{
    error::{TerminalError, TerminalErrorCode},
    traits::{
        Callback, Cancelable, DiscoveryListener, ReaderCallback, ReaderListener, TerminalListener,
        TerminalSdk,
    },
    types::{
        ConnectionConfiguration, ConnectionStatus, DiscoveryConfiguration, ReaderSoftwareUpdate,
    },
};
use parking_lot::Mutex;
use readerlink_core::{Reader, ReaderDisplayMessage, ReaderInputOption};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Number of times each SDK entry point was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub discover: usize,
    pub connect: usize,
    pub disconnect: usize,
    pub install_update: usize,
    pub discovery_cancels: usize,
    pub update_cancels: usize,
}

impl CallCounts {
    /// Total number of imperative SDK calls, cancellations excluded.
    pub fn total(&self) -> usize {
        self.discover + self.connect + self.disconnect + self.install_update
    }
}

struct ActiveDiscovery {
    id: u64,
    listener: Arc<dyn DiscoveryListener>,
    callback: Box<dyn Callback>,
}

struct PendingConnect {
    reader: Reader,
    callback: Box<dyn ReaderCallback>,
}

#[derive(Default)]
struct MockState {
    terminal_listener: Option<Arc<dyn TerminalListener>>,
    reader_listener: Option<Arc<dyn ReaderListener>>,
    discovery: Option<ActiveDiscovery>,
    next_discovery_id: u64,
    pending_connect: Option<PendingConnect>,
    pending_disconnect: Option<Box<dyn Callback>>,
    connected_reader: Option<Reader>,
    status: ConnectionStatus,
    available_update: Option<ReaderSoftwareUpdate>,
    installing: Option<ReaderSoftwareUpdate>,
    calls: CallCounts,
    last_discovery: Option<DiscoveryConfiguration>,
    last_connection: Option<ConnectionConfiguration>,
}

struct Shared {
    state: Mutex<MockState>,
    changed: Notify,
    simulation: Option<SimulatedTerminalConfig>,
}

/// Mock terminal SDK.
///
/// # Examples
///
/// ```
/// use readerlink_core::{Reader, ReaderType};
/// use readerlink_terminal::mock::MockTerminal;
/// use readerlink_terminal::traits::TerminalSdk;
///
/// let (terminal, handle) = MockTerminal::new();
///
/// assert!(terminal.connected_reader().is_none());
/// assert_eq!(handle.counts().total(), 0);
/// ```
pub struct MockTerminal {
    name: String,
    shared: Arc<Shared>,
}

impl MockTerminal {
    /// Create a manually driven mock terminal with the default name.
    ///
    /// Returns a tuple of (MockTerminal, MockTerminalHandle) where the handle
    /// resolves operations and injects reader events.
    pub fn new() -> (Self, MockTerminalHandle) {
        Self::with_name("Mock Terminal".to_string())
    }

    /// Create a manually driven mock terminal with a custom name.
    pub fn with_name(name: String) -> (Self, MockTerminalHandle) {
        Self::build(name, None)
    }

    /// Create a terminal that answers every operation by itself.
    ///
    /// Must be used from within a Tokio runtime, since the scripted
    /// responses run as spawned tasks.
    pub fn simulated(config: SimulatedTerminalConfig) -> (Self, MockTerminalHandle) {
        Self::build("Simulated Terminal".to_string(), Some(config))
    }

    fn build(name: String, simulation: Option<SimulatedTerminalConfig>) -> (Self, MockTerminalHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            changed: Notify::new(),
            simulation,
        });

        let terminal = Self {
            name: name.clone(),
            shared: Arc::clone(&shared),
        };
        let handle = MockTerminalHandle { name, shared };

        (terminal, handle)
    }

    /// Get the terminal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self) -> MockTerminalHandle {
        MockTerminalHandle {
            name: self.name.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    fn spawn_simulation<F>(&self, task: impl FnOnce(MockTerminalHandle, SimulatedTerminalConfig) -> F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(config) = self.shared.simulation.clone() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(task(self.handle(), config));
            }
            Err(_) => warn!(terminal = %self.name, "No Tokio runtime, simulated response skipped"),
        }
    }
}

impl fmt::Debug for MockTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTerminal")
            .field("name", &self.name)
            .field("status", &self.shared.state.lock().status)
            .field("simulated", &self.shared.simulation.is_some())
            .finish()
    }
}

impl TerminalSdk for MockTerminal {
    fn set_terminal_listener(&self, listener: Arc<dyn TerminalListener>) {
        self.shared.state.lock().terminal_listener = Some(listener);
    }

    fn discover_readers(
        &self,
        config: DiscoveryConfiguration,
        listener: Arc<dyn DiscoveryListener>,
        callback: Box<dyn Callback>,
    ) -> Box<dyn Cancelable> {
        let (id, replaced) = {
            let mut state = self.shared.state.lock();
            state.calls.discover += 1;
            state.next_discovery_id += 1;
            state.last_discovery = Some(config.clone());

            let id = state.next_discovery_id;
            let replaced = state.discovery.replace(ActiveDiscovery {
                id,
                listener,
                callback,
            });
            (id, replaced)
        };

        debug!(terminal = %self.name, scan = id, simulated = config.is_simulated, "Discovery started");

        if let Some(previous) = replaced {
            previous
                .callback
                .on_failure(TerminalError::canceled("Superseded by a new discovery"));
        }

        self.shared.changed.notify_waiters();
        self.spawn_simulation(|handle, sim| simulated::run_discovery(handle, sim, config));

        Box::new(DiscoveryCancelable {
            shared: Arc::clone(&self.shared),
            id,
        })
    }

    fn connect_bluetooth_reader(
        &self,
        mut reader: Reader,
        config: ConnectionConfiguration,
        listener: Arc<dyn ReaderListener>,
        callback: Box<dyn ReaderCallback>,
    ) {
        if reader.battery_level.is_none() {
            reader.battery_level = self.shared.simulation.as_ref().and_then(|sim| sim.battery_level);
        }

        let terminal_listener = {
            let mut state = self.shared.state.lock();
            state.calls.connect += 1;
            state.last_connection = Some(config);

            if state.connected_reader.is_some() || state.pending_connect.is_some() {
                drop(state);
                callback.on_failure(TerminalError::new(
                    TerminalErrorCode::AlreadyConnectedToReader,
                    "Already connected or connecting to a reader",
                ));
                return;
            }

            debug!(terminal = %self.name, reader = %reader.id, "Connect requested");
            state.reader_listener = Some(listener);
            state.pending_connect = Some(PendingConnect { reader, callback });
            state.status = ConnectionStatus::Connecting;
            state.terminal_listener.clone()
        };

        if let Some(terminal_listener) = terminal_listener {
            terminal_listener.on_connection_status_change(ConnectionStatus::Connecting);
        }

        self.shared.changed.notify_waiters();
        self.spawn_simulation(simulated::run_connect);
    }

    fn disconnect_reader(&self, callback: Box<dyn Callback>) {
        {
            let mut state = self.shared.state.lock();
            state.calls.disconnect += 1;

            if state.connected_reader.is_none() {
                drop(state);
                callback.on_failure(TerminalError::not_connected());
                return;
            }

            state.pending_disconnect = Some(callback);
        }

        debug!(terminal = %self.name, "Disconnect requested");
        self.shared.changed.notify_waiters();
        self.spawn_simulation(simulated::run_disconnect);
    }

    fn connected_reader(&self) -> Option<Reader> {
        self.shared.state.lock().connected_reader.clone()
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    fn install_available_update(&self) {
        self.shared.state.lock().calls.install_update += 1;
        debug!(terminal = %self.name, "Update installation requested");
        self.spawn_simulation(simulated::run_install);
    }
}

struct DiscoveryCancelable {
    shared: Arc<Shared>,
    id: u64,
}

impl Cancelable for DiscoveryCancelable {
    fn cancel(&self, callback: Box<dyn Callback>) {
        let canceled = {
            let mut state = self.shared.state.lock();
            if state.discovery.as_ref().is_some_and(|d| d.id == self.id) {
                state.calls.discovery_cancels += 1;
                state.discovery.take()
            } else {
                None
            }
        };

        match canceled {
            Some(discovery) => {
                debug!(scan = self.id, "Discovery canceled");
                discovery
                    .callback
                    .on_failure(TerminalError::canceled("Discovery was canceled"));
                callback.on_success();
            }
            None => callback.on_failure(TerminalError::new(
                TerminalErrorCode::CancelFailed,
                "Discovery already finished",
            )),
        }
    }

    fn is_completed(&self) -> bool {
        !self
            .shared
            .state
            .lock()
            .discovery
            .as_ref()
            .is_some_and(|d| d.id == self.id)
    }
}

struct UpdateCancelable {
    shared: Arc<Shared>,
}

impl Cancelable for UpdateCancelable {
    fn cancel(&self, callback: Box<dyn Callback>) {
        let canceled = {
            let mut state = self.shared.state.lock();
            let update = state.installing.take();
            if update.is_some() {
                state.calls.update_cancels += 1;
            }
            update.map(|update| (update, state.reader_listener.clone()))
        };

        match canceled {
            Some((update, listener)) => {
                debug!(version = %update.version, "Update installation canceled");
                callback.on_success();
                if let Some(listener) = listener {
                    listener.on_finish_installing_update(
                        Some(update),
                        Some(TerminalError::canceled("Update installation was canceled")),
                    );
                }
            }
            None => callback.on_failure(TerminalError::new(
                TerminalErrorCode::CancelFailed,
                "No update is being installed",
            )),
        }
    }

    fn is_completed(&self) -> bool {
        self.shared.state.lock().installing.is_none()
    }
}

/// Handle for driving a [`MockTerminal`].
///
/// Operations the terminal parked (connect, disconnect) are resolved with the
/// async methods, which wait until the operation has actually been
/// requested. Reader events are injected with the synchronous methods, which
/// return `false` when no listener is there to receive them.
///
/// # Examples
///
/// ```
/// use readerlink_terminal::mock::MockTerminal;
///
/// let (_terminal, handle) = MockTerminal::new();
///
/// // Nothing is connected yet, so there is no reader to report progress for
/// assert!(!handle.report_progress(0.5));
/// ```
#[derive(Clone)]
pub struct MockTerminalHandle {
    name: String,
    shared: Arc<Shared>,
}

impl MockTerminalHandle {
    /// Get the terminal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invocation counters for every SDK entry point.
    pub fn counts(&self) -> CallCounts {
        self.shared.state.lock().calls
    }

    /// Configuration of the most recent discovery request.
    pub fn last_discovery_config(&self) -> Option<DiscoveryConfiguration> {
        self.shared.state.lock().last_discovery.clone()
    }

    /// Configuration of the most recent connect request.
    pub fn last_connection_config(&self) -> Option<ConnectionConfiguration> {
        self.shared.state.lock().last_connection.clone()
    }

    /// Check if a discovery scan is running.
    pub fn is_discovering(&self) -> bool {
        self.shared.state.lock().discovery.is_some()
    }

    /// Report the readers currently in range to the running scan.
    pub fn report_readers(&self, readers: Vec<Reader>) -> bool {
        let listener = self
            .shared
            .state
            .lock()
            .discovery
            .as_ref()
            .map(|d| Arc::clone(&d.listener));

        match listener {
            Some(listener) => {
                listener.on_update_discovered_readers(readers);
                true
            }
            None => false,
        }
    }

    /// End the running scan successfully.
    pub fn complete_discovery(&self) -> bool {
        let discovery = self.shared.state.lock().discovery.take();
        match discovery {
            Some(discovery) => {
                discovery.callback.on_success();
                true
            }
            None => false,
        }
    }

    /// End the running scan with an error.
    pub fn fail_discovery(&self, error: TerminalError) -> bool {
        let discovery = self.shared.state.lock().discovery.take();
        match discovery {
            Some(discovery) => {
                discovery.callback.on_failure(error);
                true
            }
            None => false,
        }
    }

    async fn take_pending_connect(&self) -> PendingConnect {
        loop {
            let notified = self.shared.changed.notified();
            if let Some(pending) = self.shared.state.lock().pending_connect.take() {
                return pending;
            }
            notified.await;
        }
    }

    async fn take_pending_disconnect(&self) -> Box<dyn Callback> {
        loop {
            let notified = self.shared.changed.notified();
            if let Some(pending) = self.shared.state.lock().pending_disconnect.take() {
                return pending;
            }
            notified.await;
        }
    }

    /// Wait for a connect request and complete it.
    ///
    /// The terminal records the reader as connected, reports `CONNECTED` to
    /// the terminal listener and then resolves the connect callback.
    pub async fn accept_connect(&self) -> Reader {
        let pending = self.take_pending_connect().await;

        let listener = {
            let mut state = self.shared.state.lock();
            state.connected_reader = Some(pending.reader.clone());
            state.status = ConnectionStatus::Connected;
            state.terminal_listener.clone()
        };

        if let Some(listener) = listener {
            listener.on_connection_status_change(ConnectionStatus::Connected);
        }
        pending.callback.on_success(pending.reader.clone());

        pending.reader
    }

    /// Wait for a connect request and fail it.
    pub async fn reject_connect(&self, error: TerminalError) {
        let pending = self.take_pending_connect().await;

        let listener = {
            let mut state = self.shared.state.lock();
            state.status = ConnectionStatus::NotConnected;
            state.reader_listener = None;
            state.terminal_listener.clone()
        };

        if let Some(listener) = listener {
            listener.on_connection_status_change(ConnectionStatus::NotConnected);
        }
        pending.callback.on_failure(error);
    }

    /// Wait for a disconnect request and complete it.
    pub async fn accept_disconnect(&self) {
        let callback = self.take_pending_disconnect().await;

        let listener = {
            let mut state = self.shared.state.lock();
            state.connected_reader = None;
            state.reader_listener = None;
            state.installing = None;
            state.status = ConnectionStatus::NotConnected;
            state.terminal_listener.clone()
        };

        if let Some(listener) = listener {
            listener.on_connection_status_change(ConnectionStatus::NotConnected);
        }
        callback.on_success();
    }

    /// Wait for a disconnect request and fail it. The reader stays connected.
    pub async fn reject_disconnect(&self, error: TerminalError) {
        let callback = self.take_pending_disconnect().await;
        callback.on_failure(error);
    }

    /// Drop the link without the application asking for it.
    ///
    /// An installation in progress is finished with
    /// `READER_SOFTWARE_UPDATE_FAILED_INTERRUPTED`. Then the unexpected
    /// disconnect is reported, followed by `NOT_CONNECTED`.
    pub fn drop_connection(&self) -> bool {
        let (reader, interrupted, listener) = {
            let mut state = self.shared.state.lock();
            let Some(reader) = state.connected_reader.take() else {
                return false;
            };
            let reader_listener = state.reader_listener.take();
            let interrupted = state
                .installing
                .take()
                .and_then(|update| reader_listener.map(|listener| (listener, update)));
            state.status = ConnectionStatus::NotConnected;
            (reader, interrupted, state.terminal_listener.clone())
        };

        if let Some((reader_listener, update)) = interrupted {
            debug!(version = %update.version, "Link lost during update installation");
            reader_listener.on_finish_installing_update(
                Some(update),
                Some(TerminalError::new(
                    TerminalErrorCode::ReaderSoftwareUpdateFailedInterrupted,
                    "Reader disconnected during the update",
                )),
            );
        }

        if let Some(listener) = listener {
            listener.on_unexpected_reader_disconnect(reader);
            listener.on_connection_status_change(ConnectionStatus::NotConnected);
        }
        true
    }

    /// Report a raw link state to the terminal listener.
    ///
    /// Only the reported status changes; the connected reader is left as is.
    pub fn set_connection_status(&self, status: ConnectionStatus) -> bool {
        let listener = {
            let mut state = self.shared.state.lock();
            state.status = status;
            state.terminal_listener.clone()
        };

        match listener {
            Some(listener) => {
                listener.on_connection_status_change(status);
                true
            }
            None => false,
        }
    }

    /// Change the battery level of the connected reader.
    pub fn set_battery_level(&self, level: Option<f32>) -> bool {
        match self.shared.state.lock().connected_reader.as_mut() {
            Some(reader) => {
                reader.battery_level = level;
                true
            }
            None => false,
        }
    }

    fn reader_listener(&self) -> Option<Arc<dyn ReaderListener>> {
        self.shared.state.lock().reader_listener.clone()
    }

    /// Offer a firmware update to the connected reader's listener.
    pub fn report_available_update(&self, update: ReaderSoftwareUpdate) -> bool {
        let listener = {
            let mut state = self.shared.state.lock();
            state.available_update = Some(update.clone());
            state.reader_listener.clone()
        };

        match listener {
            Some(listener) => {
                listener.on_report_available_update(update);
                true
            }
            None => false,
        }
    }

    /// Begin installing the available update.
    ///
    /// Falls back to a placeholder update when none was reported.
    pub fn start_installing(&self) -> bool {
        let started = {
            let mut state = self.shared.state.lock();
            let listener = state.reader_listener.clone();
            listener.map(|listener| {
                let update = state.available_update.clone().unwrap_or_else(|| {
                    ReaderSoftwareUpdate::new("0.0.0", Duration::from_secs(60))
                });
                state.installing = Some(update.clone());
                (listener, update)
            })
        };

        match started {
            Some((listener, update)) => {
                let cancelable = UpdateCancelable {
                    shared: Arc::clone(&self.shared),
                };
                listener.on_start_installing_update(update, Box::new(cancelable));
                true
            }
            None => false,
        }
    }

    /// Check if an installation is running.
    pub fn is_installing(&self) -> bool {
        self.shared.state.lock().installing.is_some()
    }

    /// Report installation progress.
    pub fn report_progress(&self, progress: f32) -> bool {
        let listener = {
            let state = self.shared.state.lock();
            if state.installing.is_none() {
                None
            } else {
                state.reader_listener.clone()
            }
        };

        match listener {
            Some(listener) => {
                listener.on_report_reader_software_update_progress(progress);
                true
            }
            None => false,
        }
    }

    /// Finish the running installation; `error` is `None` on success.
    ///
    /// A successful installation bumps the connected reader's firmware
    /// version and clears the available update.
    pub fn finish_installing(&self, error: Option<TerminalError>) -> bool {
        let finished = {
            let mut state = self.shared.state.lock();
            let listener = state.reader_listener.clone();
            let update = state.installing.take();

            if error.is_none()
                && let Some(update) = &update
            {
                state.available_update = None;
                if let Some(reader) = state.connected_reader.as_mut() {
                    reader.firmware_version = Some(update.version.clone());
                }
            }
            listener.map(|listener| (listener, update))
        };

        match finished {
            Some((listener, update)) => {
                listener.on_finish_installing_update(update, error);
                true
            }
            None => false,
        }
    }

    /// Warn that the reader battery is low.
    pub fn low_battery_warning(&self) -> bool {
        match self.reader_listener() {
            Some(listener) => {
                listener.on_report_low_battery_warning();
                true
            }
            None => false,
        }
    }

    /// Ask the application to show a message to the customer.
    pub fn display_message(&self, message: ReaderDisplayMessage) -> bool {
        match self.reader_listener() {
            Some(listener) => {
                listener.on_request_reader_display_message(message);
                true
            }
            None => false,
        }
    }

    /// Ask the application to prompt for card input.
    pub fn request_input(&self, options: Vec<ReaderInputOption>) -> bool {
        match self.reader_listener() {
            Some(listener) => {
                listener.on_request_reader_input(options);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for MockTerminalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTerminalHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
