//! Firmware update failure classification.

use readerlink_core::UpdateFailureReason;
use readerlink_terminal::TerminalErrorCode;

/// Map a vendor error code to the reason a firmware update failed.
///
/// Total over every code: anything outside the update failure family maps to
/// [`UpdateFailureReason::Failed`]. `battery_level` is only invoked for the
/// battery-low code, and whatever it returns (including `None`) is carried in
/// the reason.
///
/// # Examples
///
/// ```
/// use readerlink_connection::classify_update_failure;
/// use readerlink_core::UpdateFailureReason;
/// use readerlink_terminal::TerminalErrorCode;
///
/// let reason = classify_update_failure(
///     TerminalErrorCode::ReaderSoftwareUpdateFailedBatteryLow,
///     || Some(0.05),
/// );
/// assert_eq!(reason, UpdateFailureReason::BatteryLow(Some(0.05)));
///
/// let reason = classify_update_failure(TerminalErrorCode::BluetoothError, || unreachable!());
/// assert_eq!(reason, UpdateFailureReason::Failed);
/// ```
pub fn classify_update_failure<F>(code: TerminalErrorCode, battery_level: F) -> UpdateFailureReason
where
    F: FnOnce() -> Option<f32>,
{
    if !code.is_software_update_failure() {
        return UpdateFailureReason::Failed;
    }

    match code {
        TerminalErrorCode::ReaderSoftwareUpdateFailedBatteryLow => {
            UpdateFailureReason::BatteryLow(battery_level())
        }
        TerminalErrorCode::ReaderSoftwareUpdateFailedInterrupted => UpdateFailureReason::Interrupted,
        TerminalErrorCode::ReaderSoftwareUpdateFailedReaderError => UpdateFailureReason::ReaderError,
        TerminalErrorCode::ReaderSoftwareUpdateFailedServerError => UpdateFailureReason::ServerError,
        _ => UpdateFailureReason::Failed,
    }
}
