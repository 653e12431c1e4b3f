use crate::{
    Result,
    constants::{MAX_BATTERY_LEVEL, MIN_BATTERY_LEVEL, fraction_to_percent},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware model of a card reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ReaderType {
    /// BBPOS Chipper 2X BT.
    Chipper2X,

    /// Stripe Reader M2.
    StripeM2,

    /// BBPOS WisePad 3.
    WisePad3,

    /// Reader model the vendor reported but we do not recognise.
    Unknown(String),
}

impl ReaderType {
    /// Get a human-readable name for the reader model.
    pub fn name(&self) -> &str {
        match self {
            Self::Chipper2X => "Chipper 2X",
            Self::StripeM2 => "Stripe M2",
            Self::WisePad3 => "WisePad 3",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for ReaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A physical card reader found by a discovery scan.
///
/// The `id` is the vendor-assigned serial number. A reader may already be
/// bound to a merchant location; connecting to a reader without one is
/// rejected before the vendor SDK is ever called.
///
/// # Examples
///
/// ```
/// use readerlink_core::{Reader, ReaderType};
///
/// let reader = Reader::new("CHB204909005931", ReaderType::Chipper2X)
///     .unwrap()
///     .with_location_id("tml_1234")
///     .with_firmware_version("1.00.03.34")
///     .with_battery_level(0.8)
///     .unwrap();
///
/// assert!(reader.has_location());
/// assert_eq!(reader.battery_percent(), Some(80));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reader {
    /// Vendor-assigned serial number.
    pub id: String,

    /// Hardware model.
    pub reader_type: ReaderType,

    /// Location the reader is registered to, if any.
    pub location_id: Option<String>,

    /// Firmware version currently installed on the reader.
    pub firmware_version: Option<String>,

    /// Battery level as a fraction in `0.0..=1.0`, when the reader reported one.
    pub battery_level: Option<f32>,
}

impl Reader {
    /// Create a reader with only the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReaderId`] if the id is empty or whitespace.
    pub fn new(id: impl Into<String>, reader_type: ReaderType) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidReaderId(id));
        }

        Ok(Self {
            id,
            reader_type,
            location_id: None,
            firmware_version: None,
            battery_level: None,
        })
    }

    /// Bind the reader to a location.
    pub fn with_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Set the installed firmware version.
    pub fn with_firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    /// Set the battery level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBatteryLevel`] if the level is outside `0.0..=1.0`.
    pub fn with_battery_level(mut self, level: f32) -> Result<Self> {
        if !(MIN_BATTERY_LEVEL..=MAX_BATTERY_LEVEL).contains(&level) {
            return Err(Error::InvalidBatteryLevel(level));
        }
        self.battery_level = Some(level);
        Ok(self)
    }

    /// Location binding, ignoring a blank `location_id`.
    pub fn location(&self) -> Option<&str> {
        self.location_id
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
    }

    /// Check whether the reader carries a usable location binding.
    pub fn has_location(&self) -> bool {
        self.location().is_some()
    }

    /// Battery level as a whole percentage.
    pub fn battery_percent(&self) -> Option<u8> {
        self.battery_level.map(fraction_to_percent)
    }
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.reader_type)
    }
}

/// Text a reader asks the application to show the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderDisplayMessage {
    RetryCard,
    InsertCard,
    InsertOrSwipeCard,
    SwipeCard,
    RemoveCard,
    MultipleContactlessCardsDetected,
    TryAnotherReadMethod,
    TryAnotherCard,
    CheckMobileDevice,
    CardRemovedTooEarly,
}

impl fmt::Display for ReaderDisplayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::RetryCard => "Retry card",
            Self::InsertCard => "Insert card",
            Self::InsertOrSwipeCard => "Insert or swipe card",
            Self::SwipeCard => "Swipe card",
            Self::RemoveCard => "Remove card",
            Self::MultipleContactlessCardsDetected => "Multiple contactless cards detected",
            Self::TryAnotherReadMethod => "Try another read method",
            Self::TryAnotherCard => "Try another card",
            Self::CheckMobileDevice => "Check mobile device",
            Self::CardRemovedTooEarly => "Card removed too early",
        };
        f.write_str(text)
    }
}

/// A way the reader can accept a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderInputOption {
    Insert,
    Swipe,
    Tap,
    ManualEntry,
}

impl fmt::Display for ReaderInputOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Insert => "Insert",
            Self::Swipe => "Swipe",
            Self::Tap => "Tap",
            Self::ManualEntry => "Manual entry",
        };
        f.write_str(text)
    }
}
