//! Value types exchanged with the terminal SDK.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Link state as the SDK reports it.
///
/// This is the raw vendor vocabulary; the connection layer turns it into a
/// `ReaderStatus` by querying the connected reader when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    #[default]
    NotConnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "NOT_CONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// Options for a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryConfiguration {
    /// Report readers from the SDK's simulated pool instead of scanning.
    pub is_simulated: bool,

    /// Give up the scan after this long. `None` scans until canceled.
    pub timeout: Option<Duration>,
}

impl DiscoveryConfiguration {
    /// Create a configuration with no timeout.
    pub fn new(is_simulated: bool) -> Self {
        Self {
            is_simulated,
            timeout: None,
        }
    }

    /// Set the scan timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for a Bluetooth connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfiguration {
    /// Location the reader is registered to for this session.
    pub location_id: String,
}

impl ConnectionConfiguration {
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
        }
    }
}

/// A firmware update the SDK has offered or is installing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSoftwareUpdate {
    /// Firmware version that will be installed.
    pub version: String,

    /// Vendor estimate of how long the installation takes.
    pub estimated_duration: Duration,

    /// Whether the reader refuses payments until the update is installed.
    pub required: bool,
}

impl ReaderSoftwareUpdate {
    /// Create an optional update with the given version and estimate.
    pub fn new(version: impl Into<String>, estimated_duration: Duration) -> Self {
        Self {
            version: version.into(),
            estimated_duration,
            required: false,
        }
    }

    /// Mark the update as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl fmt::Display for ReaderSoftwareUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (~{}s{})",
            self.version,
            self.estimated_duration.as_secs(),
            if self.required { ", required" } else { "" }
        )
    }
}
