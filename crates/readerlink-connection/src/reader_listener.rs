//! Firmware update state and reader prompts driven by vendor reader events.

use crate::classifier::classify_update_failure;
use crate::messages::ReaderMessageChannel;
use parking_lot::Mutex;
use readerlink_core::{
    ReaderDisplayMessage, ReaderInputOption, ReaderPrompt, SoftwareUpdateAvailability,
    SoftwareUpdateStatus, UpdateFailureReason,
};
use readerlink_terminal::{
    Callback, Cancelable, ReaderListener, ReaderSoftwareUpdate, TerminalError, TerminalSdk,
};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Vendor reader listener backing the update status and availability cells.
///
/// Update status follows [`SoftwareUpdateStatus::can_transition_to`]: once an
/// attempt ends in `Success` or `Failed`, further progress or outcome events
/// are ignored until a new attempt starts.
pub struct ReaderEventListener<T: TerminalSdk> {
    terminal: Weak<T>,
    messages: Arc<ReaderMessageChannel>,
    update_status: watch::Sender<SoftwareUpdateStatus>,
    availability: watch::Sender<SoftwareUpdateAvailability>,
    update_cancelable: Mutex<Option<Box<dyn Cancelable>>>,
}

impl<T: TerminalSdk> ReaderEventListener<T> {
    pub fn new(terminal: Weak<T>, messages: Arc<ReaderMessageChannel>) -> Self {
        let (update_status, _) = watch::channel(SoftwareUpdateStatus::Unknown);
        let (availability, _) = watch::channel(SoftwareUpdateAvailability::NotAvailable);

        Self {
            terminal,
            messages,
            update_status,
            availability,
            update_cancelable: Mutex::new(None),
        }
    }

    /// Subscribe to the update status, current value first.
    pub fn update_status(&self) -> watch::Receiver<SoftwareUpdateStatus> {
        self.update_status.subscribe()
    }

    /// Subscribe to update availability, current value first.
    pub fn availability(&self) -> watch::Receiver<SoftwareUpdateAvailability> {
        self.availability.subscribe()
    }

    pub fn current_update_status(&self) -> SoftwareUpdateStatus {
        self.update_status.borrow().clone()
    }

    pub fn current_availability(&self) -> SoftwareUpdateAvailability {
        *self.availability.borrow()
    }

    /// Start a fresh update attempt from `Unknown`.
    pub fn reset_update_status(&self) {
        self.set_update_status(SoftwareUpdateStatus::Unknown);
    }

    /// Abort the installation in progress.
    ///
    /// Returns `false` when there is nothing to cancel. The outcome of the
    /// cancel request itself is only logged; the vendor reports the aborted
    /// installation through the usual finish event.
    pub fn cancel_update(&self) -> bool {
        let Some(cancelable) = self.update_cancelable.lock().take() else {
            debug!("No update installation to cancel");
            return false;
        };

        if cancelable.is_completed() {
            debug!("Update installation already finished");
            return false;
        }

        info!("Canceling update installation");
        cancelable.cancel(Box::new(UpdateCancelCallback));
        true
    }

    /// Close an open attempt after the link to the reader was lost.
    ///
    /// The vendor may never report the end of an installation it could not
    /// finish. Returns `false` when no installation was in progress.
    pub fn interrupt_update(&self) -> bool {
        if !self.current_update_status().is_in_progress() {
            return false;
        }

        self.update_cancelable.lock().take();
        warn!("Reader link lost during update installation");
        self.set_update_status(SoftwareUpdateStatus::Failed {
            reason: UpdateFailureReason::Interrupted,
            message: "Reader disconnected during the update".to_string(),
        });
        true
    }

    fn set_update_status(&self, next: SoftwareUpdateStatus) {
        self.update_status.send_if_modified(|current| {
            if let Err(error) = current.check_transition(&next) {
                warn!(%error, "Update already finished, ignoring event");
                return false;
            }
            debug!(from = %current, to = %next, "Update status changed");
            *current = next;
            true
        });
    }

    fn battery_level(&self) -> Option<f32> {
        self.terminal
            .upgrade()?
            .connected_reader()?
            .battery_level
    }

    fn forward(&self, prompt: ReaderPrompt) {
        if !self.messages.publish(prompt) {
            debug!("Reader prompt dropped, no observer registered");
        }
    }
}

impl<T: TerminalSdk> ReaderListener for ReaderEventListener<T> {
    fn on_start_installing_update(&self, update: ReaderSoftwareUpdate, cancelable: Box<dyn Cancelable>) {
        info!(version = %update.version, "Update installation started");
        *self.update_cancelable.lock() = Some(cancelable);
        self.set_update_status(SoftwareUpdateStatus::InstallationStarted);
    }

    fn on_report_reader_software_update_progress(&self, progress: f32) {
        debug!(progress, "Update progress");
        self.set_update_status(SoftwareUpdateStatus::Installing { progress });
    }

    fn on_finish_installing_update(
        &self,
        update: Option<ReaderSoftwareUpdate>,
        error: Option<TerminalError>,
    ) {
        self.update_cancelable.lock().take();
        let version = update.map(|u| u.version).unwrap_or_default();

        match error {
            None => {
                info!(%version, "Update installed");
                self.availability
                    .send_replace(SoftwareUpdateAvailability::NotAvailable);
                self.set_update_status(SoftwareUpdateStatus::Success);
            }
            Some(error) => {
                let reason = classify_update_failure(error.code(), || self.battery_level());
                warn!(%version, code = %error.code(), %reason, "Update installation failed");
                self.set_update_status(SoftwareUpdateStatus::Failed {
                    reason,
                    message: error.message().to_string(),
                });
            }
        }
    }

    fn on_report_available_update(&self, update: ReaderSoftwareUpdate) {
        info!(%update, "Reader update available");
        self.availability
            .send_replace(SoftwareUpdateAvailability::Available);
    }

    fn on_report_low_battery_warning(&self) {
        warn!(battery = ?self.battery_level(), "Reader battery is low");
    }

    fn on_request_reader_display_message(&self, message: ReaderDisplayMessage) {
        debug!(%message, "Reader display request");
        self.forward(ReaderPrompt::DisplayMessage(message));
    }

    fn on_request_reader_input(&self, options: Vec<ReaderInputOption>) {
        debug!(?options, "Reader input request");
        self.forward(ReaderPrompt::InputRequest(options));
    }
}

struct UpdateCancelCallback;

impl Callback for UpdateCancelCallback {
    fn on_success(&self) {
        info!("Update installation canceled");
    }

    fn on_failure(&self, error: TerminalError) {
        warn!(code = %error.code(), error = %error.message(), "Failed to cancel update installation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readerlink_terminal::TerminalErrorCode;
    use readerlink_terminal::mock::MockTerminal;
    use std::time::Duration;

    fn listener() -> (Arc<MockTerminal>, ReaderEventListener<MockTerminal>, Arc<ReaderMessageChannel>) {
        let (terminal, _handle) = MockTerminal::new();
        let terminal = Arc::new(terminal);
        let messages = Arc::new(ReaderMessageChannel::new());
        let listener = ReaderEventListener::new(Arc::downgrade(&terminal), Arc::clone(&messages));
        (terminal, listener, messages)
    }

    fn update() -> ReaderSoftwareUpdate {
        ReaderSoftwareUpdate::new("1.00.03.40", Duration::from_secs(90))
    }

    #[test]
    fn test_initial_state() {
        let (_terminal, listener, _messages) = listener();

        assert_eq!(listener.current_update_status(), SoftwareUpdateStatus::Unknown);
        assert_eq!(
            listener.current_availability(),
            SoftwareUpdateAvailability::NotAvailable
        );
    }

    #[test]
    fn test_successful_install_clears_availability() {
        let (_terminal, listener, _messages) = listener();

        listener.on_report_available_update(update());
        assert_eq!(listener.current_availability(), SoftwareUpdateAvailability::Available);

        listener.on_report_reader_software_update_progress(0.5);
        listener.on_finish_installing_update(Some(update()), None);

        assert_eq!(listener.current_update_status(), SoftwareUpdateStatus::Success);
        assert_eq!(
            listener.current_availability(),
            SoftwareUpdateAvailability::NotAvailable
        );
    }

    #[test]
    fn test_failure_is_classified_and_keeps_availability() {
        let (_terminal, listener, _messages) = listener();

        listener.on_report_available_update(update());
        listener.on_finish_installing_update(
            Some(update()),
            Some(TerminalError::new(
                TerminalErrorCode::ReaderSoftwareUpdateFailedServerError,
                "Update server unavailable",
            )),
        );

        assert_eq!(
            listener.current_update_status(),
            SoftwareUpdateStatus::Failed {
                reason: UpdateFailureReason::ServerError,
                message: "Update server unavailable".to_string(),
            }
        );
        assert_eq!(listener.current_availability(), SoftwareUpdateAvailability::Available);
    }

    #[test]
    fn test_battery_low_without_connected_reader() {
        let (_terminal, listener, _messages) = listener();

        listener.on_finish_installing_update(
            None,
            Some(TerminalError::new(
                TerminalErrorCode::ReaderSoftwareUpdateFailedBatteryLow,
                "Battery too low",
            )),
        );

        assert!(matches!(
            listener.current_update_status(),
            SoftwareUpdateStatus::Failed {
                reason: UpdateFailureReason::BatteryLow(None),
                ..
            }
        ));
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let (_terminal, listener, _messages) = listener();
        let mut rx = listener.update_status();

        listener.on_finish_installing_update(Some(update()), None);
        rx.mark_unchanged();

        listener.on_report_reader_software_update_progress(0.9);
        listener.on_finish_installing_update(
            Some(update()),
            Some(TerminalError::new(TerminalErrorCode::ReaderSoftwareUpdateFailed, "late")),
        );

        assert!(!rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), SoftwareUpdateStatus::Success);

        // A new attempt reopens the status
        listener.reset_update_status();
        listener.on_report_reader_software_update_progress(0.1);
        assert_eq!(
            listener.current_update_status(),
            SoftwareUpdateStatus::Installing { progress: 0.1 }
        );
    }

    #[test]
    fn test_progress_is_not_forced_monotonic() {
        let (_terminal, listener, _messages) = listener();

        listener.on_report_reader_software_update_progress(0.6);
        listener.on_report_reader_software_update_progress(0.4);

        assert_eq!(
            listener.current_update_status(),
            SoftwareUpdateStatus::Installing { progress: 0.4 }
        );
    }

    #[test]
    fn test_low_battery_warning_changes_nothing() {
        let (_terminal, listener, _messages) = listener();
        let mut status = listener.update_status();
        let mut availability = listener.availability();
        status.mark_unchanged();
        availability.mark_unchanged();

        listener.on_report_low_battery_warning();

        assert!(!status.has_changed().unwrap());
        assert!(!availability.has_changed().unwrap());
    }

    #[test]
    fn test_prompts_are_forwarded() {
        let (_terminal, listener, messages) = listener();

        // Dropped silently while nobody listens
        listener.on_request_reader_display_message(ReaderDisplayMessage::RetryCard);

        let mut prompts = messages.subscribe();
        listener.on_request_reader_display_message(ReaderDisplayMessage::RemoveCard);
        listener.on_request_reader_input(vec![ReaderInputOption::Insert, ReaderInputOption::Swipe]);

        assert_eq!(
            prompts.try_recv().unwrap(),
            ReaderPrompt::DisplayMessage(ReaderDisplayMessage::RemoveCard)
        );
        assert_eq!(
            prompts.try_recv().unwrap(),
            ReaderPrompt::InputRequest(vec![ReaderInputOption::Insert, ReaderInputOption::Swipe])
        );
        assert!(prompts.try_recv().is_err());
    }

    #[test]
    fn test_interrupt_closes_open_attempt() {
        let (_terminal, listener, _messages) = listener();
        assert!(!listener.interrupt_update());

        listener.on_report_reader_software_update_progress(0.3);
        assert!(listener.interrupt_update());

        assert!(matches!(
            listener.current_update_status(),
            SoftwareUpdateStatus::Failed {
                reason: UpdateFailureReason::Interrupted,
                ..
            }
        ));
        // Already closed, a second link loss changes nothing
        assert!(!listener.interrupt_update());
    }

    #[test]
    fn test_cancel_without_installation() {
        let (_terminal, listener, _messages) = listener();

        assert!(!listener.cancel_update());
    }
}
