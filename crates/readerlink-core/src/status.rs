//! Reader, firmware update and discovery state machines.
//!
//! Every type here is a snapshot value held in a replay cell by the
//! connection layer. The transition rules that the update status enforces are
//! encoded in [`SoftwareUpdateStatus::can_transition_to`], in the same style
//! as any other closed state machine: a single `matches!` over the allowed
//! `(from, to)` pairs.

use crate::constants::fraction_to_percent;
use crate::error::{Error, Result};
use crate::types::{Reader, ReaderDisplayMessage, ReaderInputOption};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of the card reader.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reader", rename_all = "snake_case")]
pub enum ReaderStatus {
    /// No reader is connected.
    #[default]
    NotConnected,

    /// A connect handshake is in progress.
    Connecting,

    /// The vendor confirmed a connection to this reader.
    Connected(Reader),
}

impl ReaderStatus {
    /// Check if a reader is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Get the connected reader, if any.
    pub fn reader(&self) -> Option<&Reader> {
        match self {
            Self::Connected(reader) => Some(reader),
            _ => None,
        }
    }
}

impl fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "NotConnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected(reader) => write!(f, "Connected({})", reader.id),
        }
    }
}

/// Whether the vendor has reported a pending firmware update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftwareUpdateAvailability {
    #[default]
    NotAvailable,
    Available,
}

/// Why a firmware update attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "battery_level", rename_all = "snake_case")]
pub enum UpdateFailureReason {
    /// The reader battery is too low to install. Carries the last known
    /// battery level, which may be unavailable.
    BatteryLow(Option<f32>),

    /// The installation was interrupted, usually by the link dropping.
    Interrupted,

    /// The reader hardware reported an error.
    ReaderError,

    /// The update server reported an error.
    ServerError,

    /// Any failure we do not classify further.
    Failed,
}

impl fmt::Display for UpdateFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatteryLow(Some(level)) => {
                write!(f, "battery too low ({}%)", fraction_to_percent(*level))
            }
            Self::BatteryLow(None) => write!(f, "battery too low (level unknown)"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::ReaderError => write!(f, "reader error"),
            Self::ServerError => write!(f, "server error"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of a firmware update attempt.
///
/// # Transitions
///
/// ```text
/// Unknown ──► InstallationStarted ──► Installing(p) ──► Success
///    │                 │                 │  ▲    └────► Failed
///    └─────────────────┴─────────────────┘  │
///                                           └── (repeats)
/// ```
///
/// `Success` and `Failed` are terminal for the attempt. The only ways out of
/// them are a reset to `Unknown` or a fresh `InstallationStarted`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SoftwareUpdateStatus {
    #[default]
    Unknown,

    InstallationStarted,

    /// Installation in progress; `progress` is a fraction in `0.0..=1.0`.
    Installing { progress: f32 },

    Success,

    Failed {
        reason: UpdateFailureReason,
        message: String,
    },
}

impl SoftwareUpdateStatus {
    /// Check if this status ends an update attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed { .. })
    }

    /// Check if the vendor is currently installing.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InstallationStarted | Self::Installing { .. })
    }

    /// Installation progress as a whole percentage.
    ///
    /// `InstallationStarted` reports `0`; statuses without progress return `None`.
    pub fn progress_percent(&self) -> Option<u8> {
        match self {
            Self::InstallationStarted => Some(0),
            Self::Installing { progress } => Some(fraction_to_percent(*progress)),
            _ => None,
        }
    }

    /// Check if moving to `target` is allowed from this status.
    ///
    /// # Examples
    ///
    /// ```
    /// use readerlink_core::SoftwareUpdateStatus;
    ///
    /// let installing = SoftwareUpdateStatus::Installing { progress: 0.5 };
    /// assert!(installing.can_transition_to(&SoftwareUpdateStatus::Success));
    /// assert!(!SoftwareUpdateStatus::Success.can_transition_to(&installing));
    /// assert!(SoftwareUpdateStatus::Success.can_transition_to(&SoftwareUpdateStatus::InstallationStarted));
    /// ```
    pub fn can_transition_to(&self, target: &SoftwareUpdateStatus) -> bool {
        use SoftwareUpdateStatus::*;

        matches!(
            (self, target),
            // A reset or a new attempt is always accepted
            (_, Unknown | InstallationStarted)
            // Progress within an open attempt
            | (Unknown | InstallationStarted | Installing { .. }, Installing { .. })
            // Terminal outcome of an open attempt
            | (Unknown | InstallationStarted | Installing { .. }, Success | Failed { .. })
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to), as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the move is not allowed.
    pub fn check_transition(&self, target: &SoftwareUpdateStatus) -> Result<()> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }
}

impl fmt::Display for SoftwareUpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::InstallationStarted => write!(f, "InstallationStarted"),
            Self::Installing { progress } => {
                write!(f, "Installing({}%)", fraction_to_percent(*progress))
            }
            Self::Success => write!(f, "Success"),
            Self::Failed { reason, .. } => write!(f, "Failed({reason})"),
        }
    }
}

/// Internal discovery lifecycle, one sequence per scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Started,

    /// Full snapshot of the readers currently in range.
    FoundReaders(Vec<Reader>),

    Succeeded,

    Failure(String),
}

impl DiscoveryStatus {
    /// Check if this status ends the scan.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failure(_))
    }
}

/// Public discovery vocabulary exposed by the connection manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    Started,
    ReadersFound(Vec<Reader>),
    Succeeded,
    Failed(String),
}

impl From<DiscoveryStatus> for DiscoveryEvent {
    fn from(status: DiscoveryStatus) -> Self {
        match status {
            DiscoveryStatus::Started => Self::Started,
            DiscoveryStatus::FoundReaders(readers) => Self::ReadersFound(readers),
            DiscoveryStatus::Succeeded => Self::Succeeded,
            DiscoveryStatus::Failure(message) => Self::Failed(message),
        }
    }
}

/// A prompt raised by the reader while it is waiting on the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "prompt", content = "data", rename_all = "snake_case")]
pub enum ReaderPrompt {
    DisplayMessage(ReaderDisplayMessage),
    InputRequest(Vec<ReaderInputOption>),
    /// Clears whatever prompt was last shown.
    NoMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReaderType;
    use rstest::rstest;

    fn failed() -> SoftwareUpdateStatus {
        SoftwareUpdateStatus::Failed {
            reason: UpdateFailureReason::Interrupted,
            message: "link lost".to_string(),
        }
    }

    fn installing(progress: f32) -> SoftwareUpdateStatus {
        SoftwareUpdateStatus::Installing { progress }
    }

    #[rstest]
    #[case(SoftwareUpdateStatus::Unknown, SoftwareUpdateStatus::InstallationStarted)]
    #[case(SoftwareUpdateStatus::Unknown, installing(0.1))]
    #[case(SoftwareUpdateStatus::Unknown, SoftwareUpdateStatus::Success)]
    #[case(SoftwareUpdateStatus::InstallationStarted, installing(0.0))]
    #[case(SoftwareUpdateStatus::InstallationStarted, failed())]
    #[case(installing(0.4), installing(0.3))]
    #[case(installing(0.9), SoftwareUpdateStatus::Success)]
    #[case(installing(0.9), failed())]
    #[case(SoftwareUpdateStatus::Success, SoftwareUpdateStatus::InstallationStarted)]
    #[case(failed(), SoftwareUpdateStatus::Unknown)]
    fn test_update_status_valid_transitions(
        #[case] from: SoftwareUpdateStatus,
        #[case] to: SoftwareUpdateStatus,
    ) {
        assert!(from.can_transition_to(&to), "{from} -> {to} should be allowed");
    }

    #[rstest]
    #[case(SoftwareUpdateStatus::Success, installing(0.5))]
    #[case(SoftwareUpdateStatus::Success, failed())]
    #[case(SoftwareUpdateStatus::Success, SoftwareUpdateStatus::Success)]
    #[case(failed(), installing(0.5))]
    #[case(failed(), SoftwareUpdateStatus::Success)]
    #[case(failed(), failed())]
    fn test_update_status_terminal_is_sticky(
        #[case] from: SoftwareUpdateStatus,
        #[case] to: SoftwareUpdateStatus,
    ) {
        assert!(!from.can_transition_to(&to), "{from} -> {to} should be rejected");
    }

    #[test]
    fn test_check_transition_error() {
        let error = SoftwareUpdateStatus::Success
            .check_transition(&installing(0.5))
            .unwrap_err();

        assert_eq!(
            error,
            Error::InvalidStateTransition {
                from: "Success".to_string(),
                to: "Installing(50%)".to_string(),
            }
        );
        assert!(installing(0.5).check_transition(&SoftwareUpdateStatus::Success).is_ok());
    }

    #[test]
    fn test_update_status_progress_percent() {
        assert_eq!(SoftwareUpdateStatus::Unknown.progress_percent(), None);
        assert_eq!(SoftwareUpdateStatus::InstallationStarted.progress_percent(), Some(0));
        assert_eq!(installing(0.25).progress_percent(), Some(25));
        assert_eq!(SoftwareUpdateStatus::Success.progress_percent(), None);
    }

    #[test]
    fn test_update_status_flags() {
        assert!(SoftwareUpdateStatus::Success.is_terminal());
        assert!(failed().is_terminal());
        assert!(!installing(0.2).is_terminal());
        assert!(installing(0.2).is_in_progress());
        assert!(!SoftwareUpdateStatus::Unknown.is_in_progress());
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            UpdateFailureReason::BatteryLow(Some(0.05)).to_string(),
            "battery too low (5%)"
        );
        assert_eq!(
            UpdateFailureReason::BatteryLow(None).to_string(),
            "battery too low (level unknown)"
        );
        assert_eq!(UpdateFailureReason::ServerError.to_string(), "server error");
    }

    #[test]
    fn test_reader_status_accessors() {
        let reader = Reader::new("CHB1", ReaderType::Chipper2X).unwrap();
        let status = ReaderStatus::Connected(reader.clone());

        assert!(status.is_connected());
        assert_eq!(status.reader(), Some(&reader));
        assert_eq!(status.to_string(), "Connected(CHB1)");
        assert_eq!(ReaderStatus::default(), ReaderStatus::NotConnected);
        assert!(ReaderStatus::Connecting.reader().is_none());
    }

    #[test]
    fn test_discovery_status_projection() {
        let reader = Reader::new("CHB1", ReaderType::Chipper2X).unwrap();

        assert_eq!(DiscoveryEvent::from(DiscoveryStatus::Started), DiscoveryEvent::Started);
        assert_eq!(
            DiscoveryEvent::from(DiscoveryStatus::FoundReaders(vec![reader.clone()])),
            DiscoveryEvent::ReadersFound(vec![reader])
        );
        assert_eq!(
            DiscoveryEvent::from(DiscoveryStatus::Failure("bluetooth off".into())),
            DiscoveryEvent::Failed("bluetooth off".into())
        );
        assert!(DiscoveryStatus::Succeeded.is_terminal());
        assert!(!DiscoveryStatus::Started.is_terminal());
    }

    #[test]
    fn test_update_status_serialization() {
        let status = SoftwareUpdateStatus::Failed {
            reason: UpdateFailureReason::BatteryLow(Some(0.5)),
            message: "low".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"]["reason"], "battery_low");
        assert_eq!(json["reason"]["battery_level"], 0.5);
    }
}
