//! Reader status state machine driven by vendor link events.

use crate::reader_listener::ReaderEventListener;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use readerlink_core::{Reader, ReaderStatus};
use readerlink_terminal::{ConnectionStatus, TerminalListener, TerminalSdk};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Translates link state callbacks into a replayed [`ReaderStatus`].
///
/// The connected reader is not part of the vendor's `CONNECTED` event; it is
/// queried from the SDK when the event arrives. Consecutive identical
/// statuses are not re-emitted. The status follows vendor callbacks only,
/// so `Connected` is reached through the vendor's own `CONNECTING` report.
///
/// Losing the link also ends any firmware update in progress on the
/// [`ReaderEventListener`].
pub struct ConnectionStatusListener<T: TerminalSdk> {
    terminal: Weak<T>,
    reader_listener: Arc<ReaderEventListener<T>>,
    status: watch::Sender<ReaderStatus>,
    connected_at: Mutex<Option<DateTime<Utc>>>,
}

impl<T: TerminalSdk> ConnectionStatusListener<T> {
    /// Create a listener that queries `terminal` for the connected reader.
    ///
    /// The terminal is held weakly since the terminal itself keeps the
    /// listener registered.
    pub fn new(terminal: Weak<T>, reader_listener: Arc<ReaderEventListener<T>>) -> Self {
        let (status, _) = watch::channel(ReaderStatus::NotConnected);
        Self {
            terminal,
            reader_listener,
            status,
            connected_at: Mutex::new(None),
        }
    }

    /// Subscribe to reader status, current value first.
    pub fn subscribe(&self) -> watch::Receiver<ReaderStatus> {
        self.status.subscribe()
    }

    /// Current reader status.
    pub fn current(&self) -> ReaderStatus {
        self.status.borrow().clone()
    }

    /// When the current connection was confirmed.
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        *self.connected_at.lock()
    }

    fn transition(&self, next: ReaderStatus) {
        let connected = next.is_connected();
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = %current, to = %next, "Reader status changed");
            *current = next;
            true
        });

        if changed {
            *self.connected_at.lock() = connected.then(Utc::now);
        } else {
            debug!("Reader status unchanged, not re-emitted");
        }
    }

    fn connected_reader(&self) -> Option<Reader> {
        self.terminal.upgrade()?.connected_reader()
    }
}

impl<T: TerminalSdk> TerminalListener for ConnectionStatusListener<T> {
    fn on_connection_status_change(&self, status: ConnectionStatus) {
        debug!(%status, "Vendor connection status");

        match status {
            ConnectionStatus::NotConnected => self.transition(ReaderStatus::NotConnected),
            ConnectionStatus::Connecting => self.transition(ReaderStatus::Connecting),
            ConnectionStatus::Connected => match self.connected_reader() {
                Some(reader) => self.transition(ReaderStatus::Connected(reader)),
                None => {
                    error!("Vendor reported CONNECTED without a connected reader");
                    debug_assert!(false, "CONNECTED reported without a connected reader");
                }
            },
        }
    }

    fn on_unexpected_reader_disconnect(&self, reader: Reader) {
        warn!(reader = %reader.id, "Reader disconnected unexpectedly");
        self.transition(ReaderStatus::NotConnected);
        self.reader_listener.interrupt_update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ConnectCallback, single_shot};
    use crate::messages::ReaderMessageChannel;
    use readerlink_core::{ReaderType, SoftwareUpdateStatus, UpdateFailureReason};
    use readerlink_terminal::mock::{MockTerminal, MockTerminalHandle};
    use readerlink_terminal::{ConnectionConfiguration, ReaderListener};

    struct Fixture {
        terminal: Arc<MockTerminal>,
        handle: MockTerminalHandle,
        listener: Arc<ConnectionStatusListener<MockTerminal>>,
        reader_listener: Arc<ReaderEventListener<MockTerminal>>,
    }

    fn fixture() -> Fixture {
        let (terminal, handle) = MockTerminal::new();
        let terminal = Arc::new(terminal);
        let reader_listener = Arc::new(ReaderEventListener::new(
            Arc::downgrade(&terminal),
            Arc::new(ReaderMessageChannel::new()),
        ));
        let listener = Arc::new(ConnectionStatusListener::new(
            Arc::downgrade(&terminal),
            Arc::clone(&reader_listener),
        ));
        Fixture {
            terminal,
            handle,
            listener,
            reader_listener,
        }
    }

    fn reader() -> Reader {
        Reader::new("CHB1", ReaderType::Chipper2X)
            .unwrap()
            .with_location_id("tml_1")
    }

    #[test]
    fn test_initial_status() {
        let f = fixture();

        assert_eq!(f.listener.current(), ReaderStatus::NotConnected);
        assert_eq!(f.listener.connected_since(), None);
    }

    #[test]
    fn test_identical_statuses_are_not_reemitted() {
        let f = fixture();
        let mut rx = f.listener.subscribe();
        rx.mark_unchanged();

        f.listener.on_connection_status_change(ConnectionStatus::NotConnected);
        assert!(!rx.has_changed().unwrap());

        f.listener.on_connection_status_change(ConnectionStatus::Connecting);
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        f.listener.on_connection_status_change(ConnectionStatus::Connecting);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), ReaderStatus::Connecting);
    }

    #[tokio::test]
    async fn test_connecting_precedes_connected() {
        let f = fixture();
        f.terminal
            .set_terminal_listener(Arc::clone(&f.listener) as Arc<dyn TerminalListener>);
        let mut rx = f.listener.subscribe();
        assert_eq!(*rx.borrow_and_update(), ReaderStatus::NotConnected);

        let (outcome, pending) = single_shot("connect");
        f.terminal.connect_bluetooth_reader(
            reader(),
            ConnectionConfiguration::new("tml_1"),
            Arc::clone(&f.reader_listener) as Arc<dyn ReaderListener>,
            Box::new(ConnectCallback { outcome }),
        );

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ReaderStatus::Connecting);
        assert_eq!(f.listener.connected_since(), None);

        f.handle.accept_connect().await;
        assert_eq!(pending.wait().await, Ok(true));

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ReaderStatus::Connected(reader()));
        assert!(f.listener.connected_since().is_some());
    }

    #[test]
    fn test_unexpected_disconnect_forces_not_connected() {
        let f = fixture();
        f.listener.on_connection_status_change(ConnectionStatus::Connecting);

        f.listener.on_unexpected_reader_disconnect(reader());

        assert_eq!(f.listener.current(), ReaderStatus::NotConnected);
        // Nothing was being installed
        assert_eq!(
            f.reader_listener.current_update_status(),
            SoftwareUpdateStatus::Unknown
        );
    }

    #[test]
    fn test_unexpected_disconnect_interrupts_update() {
        let f = fixture();
        f.reader_listener.on_report_reader_software_update_progress(0.3);

        f.listener.on_unexpected_reader_disconnect(reader());

        assert!(matches!(
            f.reader_listener.current_update_status(),
            SoftwareUpdateStatus::Failed {
                reason: UpdateFailureReason::Interrupted,
                ..
            }
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without a connected reader")]
    fn test_connected_without_reader_is_invariant_violation() {
        let f = fixture();

        f.listener.on_connection_status_change(ConnectionStatus::Connected);
    }
}
