//! Bridges one-shot vendor callbacks into awaitable results.
//!
//! A [`SingleShot`] owns the sending half of a oneshot channel and may be
//! resolved exactly once. Resolving twice is a vendor contract violation:
//! it is logged and trips a debug assertion. The callback adapters below turn
//! the vendor's success/failure pair into a `bool` outcome.
//!
//! A cell can also carry the [`InFlightGuard`] of its operation. The guard
//! then lives as long as the vendor holds the callback, so the single-flight
//! slot stays claimed even if the awaiting caller gives up early.

use crate::error::{ConnectionError, Result};
use parking_lot::Mutex;
use readerlink_core::Reader;
use readerlink_terminal::{Callback, ReaderCallback, TerminalError};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// One-time resolution cell.
pub(crate) struct SingleShot<T> {
    operation: &'static str,
    sender: Mutex<Option<oneshot::Sender<T>>>,
    in_flight: Mutex<Option<InFlightGuard>>,
}

/// Awaitable side of a [`SingleShot`].
pub(crate) struct Pending<T> {
    operation: &'static str,
    receiver: oneshot::Receiver<T>,
}

pub(crate) fn single_shot<T>(operation: &'static str) -> (SingleShot<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        SingleShot {
            operation,
            sender: Mutex::new(Some(sender)),
            in_flight: Mutex::new(None),
        },
        Pending {
            operation,
            receiver,
        },
    )
}

impl<T> SingleShot<T> {
    /// Keep `guard` claimed until this cell is resolved or dropped.
    pub(crate) fn holding(mut self, guard: InFlightGuard) -> Self {
        *self.in_flight.get_mut() = Some(guard);
        self
    }

    pub(crate) fn resolve(&self, value: T) {
        let sender = self.sender.lock().take();
        // Release the slot before the waiter can observe the outcome
        drop(self.in_flight.lock().take());

        match sender {
            Some(sender) => {
                if sender.send(value).is_err() {
                    debug!(operation = self.operation, "Caller stopped waiting before resolution");
                }
            }
            None => {
                error!(operation = self.operation, "Callback resolved more than once");
                debug_assert!(false, "{} callback resolved more than once", self.operation);
            }
        }
    }
}

impl<T> Pending<T> {
    /// Wait for the resolution.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::CallbackDropped`] if the cell was dropped
    /// without being resolved.
    pub(crate) async fn wait(self) -> Result<T> {
        self.receiver
            .await
            .map_err(|_| ConnectionError::CallbackDropped {
                operation: self.operation,
            })
    }
}

/// Resolves a connect request with `true` on success.
pub(crate) struct ConnectCallback {
    pub(crate) outcome: SingleShot<bool>,
}

impl ReaderCallback for ConnectCallback {
    fn on_success(&self, reader: Reader) {
        info!(reader = %reader.id, "Connected to reader");
        self.outcome.resolve(true);
    }

    fn on_failure(&self, error: TerminalError) {
        warn!(code = %error.code(), error = %error.message(), "Failed to connect to reader");
        self.outcome.resolve(false);
    }
}

/// Resolves a disconnect request with `true` on success.
pub(crate) struct DisconnectCallback {
    pub(crate) outcome: SingleShot<bool>,
}

impl Callback for DisconnectCallback {
    fn on_success(&self) {
        info!("Disconnected from reader");
        self.outcome.resolve(true);
    }

    fn on_failure(&self, error: TerminalError) {
        warn!(code = %error.code(), error = %error.message(), "Failed to disconnect from reader");
        self.outcome.resolve(false);
    }
}

/// Tracks the single-shot operation currently waiting on the vendor.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    current: Arc<Mutex<Option<&'static str>>>,
}

/// Clears the in-flight slot when dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    slot: Arc<Mutex<Option<&'static str>>>,
}

impl InFlight {
    /// Claim the slot for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::OperationInProgress`] if another operation
    /// holds it.
    pub(crate) fn begin(&self, operation: &'static str) -> Result<InFlightGuard> {
        let mut current = self.current.lock();
        if let Some(in_flight) = *current {
            return Err(ConnectionError::OperationInProgress {
                requested: operation,
                in_flight,
            });
        }

        *current = Some(operation);
        Ok(InFlightGuard {
            slot: Arc::clone(&self.current),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}
