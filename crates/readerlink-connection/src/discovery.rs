//! Discovery scans as streams of [`DiscoveryStatus`].
//!
//! Each call to [`DiscoverReadersAction::discover`] opens one vendor scan and
//! returns a [`DiscoverySession`] yielding:
//!
//! 1. `Started`, once;
//! 2. `FoundReaders(list)` for every vendor list update, each a full snapshot;
//! 3. exactly one of `Succeeded` or `Failure(message)`, after which the
//!    stream ends.
//!
//! Dropping the session before the terminal event cancels the vendor scan,
//! exactly once.

use futures::Stream;
use readerlink_core::{DiscoveryStatus, Reader};
use readerlink_terminal::{
    Callback, Cancelable, DiscoveryConfiguration, DiscoveryListener, TerminalError, TerminalSdk,
};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opens discovery scans on the terminal.
pub struct DiscoverReadersAction<T: TerminalSdk> {
    terminal: Arc<T>,
    timeout: Option<Duration>,
}

impl<T: TerminalSdk> DiscoverReadersAction<T> {
    pub fn new(terminal: Arc<T>) -> Self {
        Self {
            terminal,
            timeout: None,
        }
    }

    /// Ask the vendor to give up scans after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start a scan. `simulated` selects the vendor's simulated reader pool.
    pub fn discover(&self, simulated: bool) -> DiscoverySession {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = Arc::new(ScanRelay {
            session_id,
            tx,
            finished: AtomicBool::new(false),
        });

        relay.emit(DiscoveryStatus::Started);
        info!(session = %session_id, simulated, "Discovering readers");

        let mut config = DiscoveryConfiguration::new(simulated);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        let cancelable = self.terminal.discover_readers(
            config,
            Arc::clone(&relay) as Arc<dyn DiscoveryListener>,
            Box::new(ScanOutcome(Arc::clone(&relay))),
        );

        DiscoverySession {
            session_id,
            rx,
            relay,
            cancelable: Some(cancelable),
            done: false,
        }
    }
}

/// Shared between the vendor-side listener and callback of one scan.
struct ScanRelay {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<DiscoveryStatus>,
    finished: AtomicBool,
}

impl ScanRelay {
    fn emit(&self, status: DiscoveryStatus) {
        let already_finished = if status.is_terminal() {
            self.finished.swap(true, Ordering::AcqRel)
        } else {
            self.finished.load(Ordering::Acquire)
        };

        if already_finished {
            debug!(session = %self.session_id, ?status, "Scan already finished, dropping event");
            return;
        }
        // The session may already be gone, in which case nobody wants the event
        let _ = self.tx.send(status);
    }
}

impl DiscoveryListener for ScanRelay {
    fn on_update_discovered_readers(&self, readers: Vec<Reader>) {
        debug!(session = %self.session_id, count = readers.len(), "Readers discovered");
        self.emit(DiscoveryStatus::FoundReaders(readers));
    }
}

struct ScanOutcome(Arc<ScanRelay>);

impl Callback for ScanOutcome {
    fn on_success(&self) {
        info!(session = %self.0.session_id, "Discovery finished");
        self.0.emit(DiscoveryStatus::Succeeded);
    }

    fn on_failure(&self, error: TerminalError) {
        warn!(session = %self.0.session_id, code = %error.code(), error = %error.message(), "Discovery failed");
        self.0.emit(DiscoveryStatus::Failure(error.message().to_string()));
    }
}

/// A running discovery scan.
///
/// Implements [`Stream`]; see the module docs for the event sequence.
pub struct DiscoverySession {
    session_id: Uuid,
    rx: mpsc::UnboundedReceiver<DiscoveryStatus>,
    relay: Arc<ScanRelay>,
    cancelable: Option<Box<dyn Cancelable>>,
    done: bool,
}

impl DiscoverySession {
    /// Identifier used in this scan's log records.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Check if the vendor has reported the end of the scan.
    pub fn is_finished(&self) -> bool {
        self.relay.finished.load(Ordering::Acquire)
    }
}

impl Stream for DiscoverySession {
    type Item = DiscoveryStatus;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(status)) => {
                if status.is_terminal() {
                    this.done = true;
                }
                Poll::Ready(Some(status))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        // Stop relaying before canceling so the vendor's cancel outcome is not emitted
        let was_finished = self.relay.finished.swap(true, Ordering::AcqRel);

        if let Some(cancelable) = self.cancelable.take()
            && !was_finished
        {
            info!(session = %self.session_id, "Discovery dropped, canceling scan");
            cancelable.cancel(Box::new(CancelOutcome(self.session_id)));
        }
    }
}

struct CancelOutcome(Uuid);

impl Callback for CancelOutcome {
    fn on_success(&self) {
        debug!(session = %self.0, "Scan canceled");
    }

    fn on_failure(&self, error: TerminalError) {
        warn!(session = %self.0, code = %error.code(), "Failed to cancel scan");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use readerlink_core::ReaderType;
    use readerlink_terminal::TerminalErrorCode;
    use readerlink_terminal::mock::MockTerminal;

    fn reader(id: &str) -> Reader {
        Reader::new(id, ReaderType::WisePad3).unwrap()
    }

    #[tokio::test]
    async fn test_discovery_event_sequence() {
        let (terminal, handle) = MockTerminal::new();
        let action = DiscoverReadersAction::new(Arc::new(terminal));

        let session = action.discover(true);
        handle.report_readers(vec![reader("A")]);
        handle.report_readers(vec![reader("A"), reader("B")]);
        handle.complete_discovery();

        let events: Vec<_> = session.collect().await;
        assert_eq!(
            events,
            vec![
                DiscoveryStatus::Started,
                DiscoveryStatus::FoundReaders(vec![reader("A")]),
                DiscoveryStatus::FoundReaders(vec![reader("A"), reader("B")]),
                DiscoveryStatus::Succeeded,
            ]
        );
        assert_eq!(handle.counts().discovery_cancels, 0);
    }

    #[tokio::test]
    async fn test_vendor_failure_becomes_failure_event() {
        let (terminal, handle) = MockTerminal::new();
        let action = DiscoverReadersAction::new(Arc::new(terminal));

        let session = action.discover(false);
        handle.fail_discovery(TerminalError::new(
            TerminalErrorCode::BluetoothDisabled,
            "Bluetooth is disabled",
        ));

        let events: Vec<_> = session.collect().await;
        assert_eq!(
            events,
            vec![
                DiscoveryStatus::Started,
                DiscoveryStatus::Failure("Bluetooth is disabled".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_cancels_scan_once() {
        let (terminal, handle) = MockTerminal::new();
        let action = DiscoverReadersAction::new(Arc::new(terminal));

        let mut session = action.discover(true);
        assert_eq!(session.next().await, Some(DiscoveryStatus::Started));
        handle.report_readers(vec![reader("A")]);

        drop(session);

        assert_eq!(handle.counts().discovery_cancels, 1);
        assert!(!handle.is_discovering());
        assert!(!handle.report_readers(vec![reader("B")]));
    }

    #[tokio::test]
    async fn test_drop_after_terminal_does_not_cancel() {
        let (terminal, handle) = MockTerminal::new();
        let action = DiscoverReadersAction::new(Arc::new(terminal));

        let session = action.discover(true);
        handle.complete_discovery();
        assert!(session.is_finished());

        drop(session);

        assert_eq!(handle.counts().discovery_cancels, 0);
    }

    #[tokio::test]
    async fn test_timeout_is_passed_to_vendor() {
        let (terminal, handle) = MockTerminal::new();
        let action = DiscoverReadersAction::new(Arc::new(terminal))
            .with_timeout(Some(Duration::from_secs(15)));

        let _session = action.discover(true);

        assert_eq!(
            handle.last_discovery_config(),
            Some(DiscoveryConfiguration::new(true).with_timeout(Duration::from_secs(15)))
        );
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (terminal, handle) = MockTerminal::new();
        let action = DiscoverReadersAction::new(Arc::new(terminal));

        let first = action.discover(true);
        handle.complete_discovery();
        let second = action.discover(true);

        assert_ne!(first.session_id(), second.session_id());
        assert!(first.is_finished());
        assert!(!second.is_finished());
    }
}
