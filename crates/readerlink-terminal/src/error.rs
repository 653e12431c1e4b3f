//! Error types reported by the terminal SDK.
//!
//! The vendor reports every failure as a single error type carrying a code and
//! a human-readable message. Callers that need to react to a specific failure
//! (for example the firmware update classifier) match on
//! [`TerminalErrorCode`]; everything else only ever displays the message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable cause of a [`TerminalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum TerminalErrorCode {
    /// The operation was canceled by the application.
    Canceled,

    /// A cancel request arrived after the operation had already completed.
    CancelFailed,

    /// The operation requires a connected reader.
    NotConnectedToReader,

    /// A reader is already connected.
    AlreadyConnectedToReader,

    /// The reader is busy with another operation.
    ReaderBusy,

    /// The Bluetooth radio is switched off.
    BluetoothDisabled,

    /// Generic Bluetooth transport failure.
    BluetoothError,

    /// A discovery scan ran out of time before finishing.
    BluetoothScanTimedOut,

    /// The connection handshake with the reader failed.
    BluetoothConnectionFailed,

    /// Firmware update failed for a reason the vendor did not classify.
    ReaderSoftwareUpdateFailed,

    /// Firmware update refused or aborted because the battery is too low.
    ReaderSoftwareUpdateFailedBatteryLow,

    /// Firmware update was interrupted, typically by the link dropping.
    ReaderSoftwareUpdateFailedInterrupted,

    /// The update server rejected or failed the firmware download.
    ReaderSoftwareUpdateFailedServerError,

    /// The reader hardware reported an error while installing.
    ReaderSoftwareUpdateFailedReaderError,

    /// The SDK hit an internal error.
    UnexpectedSdkError,
}

impl TerminalErrorCode {
    /// Vendor wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canceled => "CANCELED",
            Self::CancelFailed => "CANCEL_FAILED",
            Self::NotConnectedToReader => "NOT_CONNECTED_TO_READER",
            Self::AlreadyConnectedToReader => "ALREADY_CONNECTED_TO_READER",
            Self::ReaderBusy => "READER_BUSY",
            Self::BluetoothDisabled => "BLUETOOTH_DISABLED",
            Self::BluetoothError => "BLUETOOTH_ERROR",
            Self::BluetoothScanTimedOut => "BLUETOOTH_SCAN_TIMED_OUT",
            Self::BluetoothConnectionFailed => "BLUETOOTH_CONNECTION_FAILED",
            Self::ReaderSoftwareUpdateFailed => "READER_SOFTWARE_UPDATE_FAILED",
            Self::ReaderSoftwareUpdateFailedBatteryLow => "READER_SOFTWARE_UPDATE_FAILED_BATTERY_LOW",
            Self::ReaderSoftwareUpdateFailedInterrupted => {
                "READER_SOFTWARE_UPDATE_FAILED_INTERRUPTED"
            }
            Self::ReaderSoftwareUpdateFailedServerError => {
                "READER_SOFTWARE_UPDATE_FAILED_SERVER_ERROR"
            }
            Self::ReaderSoftwareUpdateFailedReaderError => {
                "READER_SOFTWARE_UPDATE_FAILED_READER_ERROR"
            }
            Self::UnexpectedSdkError => "UNEXPECTED_SDK_ERROR",
        }
    }

    /// Check if the code belongs to the firmware update family.
    pub fn is_software_update_failure(&self) -> bool {
        matches!(
            self,
            Self::ReaderSoftwareUpdateFailed
                | Self::ReaderSoftwareUpdateFailedBatteryLow
                | Self::ReaderSoftwareUpdateFailedInterrupted
                | Self::ReaderSoftwareUpdateFailedServerError
                | Self::ReaderSoftwareUpdateFailedReaderError
        )
    }
}

impl fmt::Display for TerminalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the terminal SDK through a failure callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TerminalError {
    code: TerminalErrorCode,
    message: String,
}

impl TerminalError {
    /// Create a new terminal error.
    pub fn new(code: TerminalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a cancellation error.
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(TerminalErrorCode::Canceled, message)
    }

    /// Create a not-connected error.
    pub fn not_connected() -> Self {
        Self::new(
            TerminalErrorCode::NotConnectedToReader,
            "No reader is connected",
        )
    }

    /// Machine-readable error code.
    pub fn code(&self) -> TerminalErrorCode {
        self.code
    }

    /// Human-readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_terminal_error_display() {
        let error = TerminalError::new(TerminalErrorCode::BluetoothDisabled, "Bluetooth is off");
        assert_eq!(error.to_string(), "BLUETOOTH_DISABLED: Bluetooth is off");
        assert_eq!(error.code(), TerminalErrorCode::BluetoothDisabled);
        assert_eq!(error.message(), "Bluetooth is off");
    }

    #[test]
    fn test_terminal_error_helpers() {
        assert_eq!(
            TerminalError::not_connected().code(),
            TerminalErrorCode::NotConnectedToReader
        );
        assert_eq!(
            TerminalError::canceled("scan canceled").code(),
            TerminalErrorCode::Canceled
        );
    }

    #[rstest]
    #[case(TerminalErrorCode::ReaderSoftwareUpdateFailed, true)]
    #[case(TerminalErrorCode::ReaderSoftwareUpdateFailedBatteryLow, true)]
    #[case(TerminalErrorCode::ReaderSoftwareUpdateFailedReaderError, true)]
    #[case(TerminalErrorCode::BluetoothError, false)]
    #[case(TerminalErrorCode::Canceled, false)]
    fn test_software_update_family(#[case] code: TerminalErrorCode, #[case] expected: bool) {
        assert_eq!(code.is_software_update_failure(), expected);
    }

    #[test]
    fn test_error_code_wire_name_matches_serde() {
        let code = TerminalErrorCode::ReaderSoftwareUpdateFailedBatteryLow;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, format!("\"{}\"", code.as_str()));
    }
}
