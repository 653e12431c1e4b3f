//! Shared numeric bounds.
//!
//! Battery levels and update progress are both reported by the vendor as
//! fractions in the closed range `0.0..=1.0`. UI code usually wants whole
//! percentages, so the conversion factor lives here too.

/// Lowest battery level a reader can report.
pub const MIN_BATTERY_LEVEL: f32 = 0.0;

/// Highest battery level a reader can report.
pub const MAX_BATTERY_LEVEL: f32 = 1.0;

/// Progress fraction reported when an installation has just begun.
pub const MIN_UPDATE_PROGRESS: f32 = 0.0;

/// Progress fraction reported when an installation has finished copying.
pub const MAX_UPDATE_PROGRESS: f32 = 1.0;

/// Multiplier from a fraction to a whole percentage.
pub const PERCENT_100: f32 = 100.0;

/// Convert a `0.0..=1.0` fraction into a whole percentage.
///
/// Values outside the range are clamped, so a vendor that overshoots
/// (for example `1.0000001`) still renders as `100`.
///
/// # Examples
///
/// ```
/// use readerlink_core::constants::fraction_to_percent;
///
/// assert_eq!(fraction_to_percent(0.25), 25);
/// assert_eq!(fraction_to_percent(1.2), 100);
/// ```
#[must_use]
pub fn fraction_to_percent(fraction: f32) -> u8 {
    let clamped = fraction.clamp(MIN_UPDATE_PROGRESS, MAX_UPDATE_PROGRESS);
    (clamped * PERCENT_100).round() as u8
}
