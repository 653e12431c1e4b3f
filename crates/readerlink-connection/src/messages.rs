//! Single-observer channel for reader prompts.
//!
//! Prompts are transient: each one is delivered to the observer registered at
//! that moment, or dropped when there is none. Registering a new observer
//! replaces the previous one, whose receiver then ends.

use parking_lot::Mutex;
use readerlink_core::ReaderPrompt;
use tokio::sync::mpsc;
use tracing::trace;

/// Receiving end handed to the registered observer.
pub type ReaderPromptReceiver = mpsc::UnboundedReceiver<ReaderPrompt>;

/// Forwards reader prompts to at most one observer.
///
/// # Examples
///
/// ```
/// use readerlink_connection::ReaderMessageChannel;
/// use readerlink_core::{ReaderDisplayMessage, ReaderPrompt};
///
/// let channel = ReaderMessageChannel::new();
///
/// // No observer yet, so the prompt is dropped
/// assert!(!channel.publish(ReaderPrompt::NoMessage));
///
/// let mut prompts = channel.subscribe();
/// assert!(channel.publish(ReaderPrompt::DisplayMessage(ReaderDisplayMessage::InsertCard)));
/// assert_eq!(
///     prompts.try_recv().unwrap(),
///     ReaderPrompt::DisplayMessage(ReaderDisplayMessage::InsertCard)
/// );
/// ```
#[derive(Debug, Default)]
pub struct ReaderMessageChannel {
    observer: Mutex<Option<mpsc::UnboundedSender<ReaderPrompt>>>,
}

impl ReaderMessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer, replacing any previous one.
    pub fn subscribe(&self) -> ReaderPromptReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.observer.lock().replace(tx).is_some() {
            trace!("Reader prompt observer replaced");
        }
        rx
    }

    /// Remove the current observer, if any.
    pub fn unsubscribe(&self) {
        self.observer.lock().take();
    }

    /// Deliver a prompt to the current observer.
    ///
    /// Returns `false` when the prompt was dropped because nobody is
    /// listening. An observer whose receiver is gone is forgotten.
    pub fn publish(&self, prompt: ReaderPrompt) -> bool {
        let mut observer = self.observer.lock();

        let Some(tx) = observer.as_ref() else {
            trace!(?prompt, "No prompt observer, dropping");
            return false;
        };

        match tx.send(prompt) {
            Ok(()) => true,
            Err(mpsc::error::SendError(prompt)) => {
                trace!(?prompt, "Prompt observer went away, dropping");
                observer.take();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readerlink_core::{ReaderDisplayMessage, ReaderInputOption};

    fn display(message: ReaderDisplayMessage) -> ReaderPrompt {
        ReaderPrompt::DisplayMessage(message)
    }

    #[test]
    fn test_publish_without_observer_drops() {
        let channel = ReaderMessageChannel::new();

        assert!(!channel.publish(display(ReaderDisplayMessage::SwipeCard)));

        // Dropped prompts are not queued for a later observer
        let mut rx = channel.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_last_registered_observer_wins() {
        let channel = ReaderMessageChannel::new();

        let mut first = channel.subscribe();
        assert!(channel.publish(display(ReaderDisplayMessage::InsertCard)));

        let mut second = channel.subscribe();
        assert!(channel.publish(ReaderPrompt::InputRequest(vec![ReaderInputOption::Tap])));

        assert_eq!(first.try_recv().unwrap(), display(ReaderDisplayMessage::InsertCard));
        // The superseded receiver is closed and gets nothing further
        assert!(matches!(
            first.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(
            second.try_recv().unwrap(),
            ReaderPrompt::InputRequest(vec![ReaderInputOption::Tap])
        );
    }

    #[test]
    fn test_closed_observer_is_forgotten() {
        let channel = ReaderMessageChannel::new();

        let rx = channel.subscribe();
        assert!(channel.publish(ReaderPrompt::NoMessage));
        drop(rx);

        assert!(!channel.publish(ReaderPrompt::NoMessage));
        assert!(channel.observer.lock().is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let channel = ReaderMessageChannel::new();

        let mut rx = channel.subscribe();
        channel.unsubscribe();

        assert!(!channel.publish(ReaderPrompt::NoMessage));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
