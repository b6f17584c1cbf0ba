//! Activity timestamp parsing and the idle-threshold rule.
//!
//! Jupyter reports `last_activity` as `YYYY-MM-DDTHH:MM:SS.ffffff` followed by
//! a `z` suffix. There is exactly one accepted shape; anything else is a
//! [`AutostopError::Format`].

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use chrono::Utc;

use crate::error::AutostopError;
use crate::error::Result;

/// Human-readable form of the accepted wire format, used in error messages.
pub const ACTIVITY_TIMESTAMP_FORMAT: &str = "YYYY-MM-DDTHH:MM:SS.ffffffz";

/// Shape of `YYYY-MM-DDTHH:MM:SS.ffffff` (without the suffix).
/// `d` is any ASCII digit; every other byte must match literally.
const BODY_LAYOUT: &[u8; 26] = b"dddd-dd-ddTdd:dd:dd.dddddd";

fn matches_layout(body: &str) -> bool {
    let bytes = body.as_bytes();
    bytes.len() == BODY_LAYOUT.len()
        && bytes
            .iter()
            .zip(BODY_LAYOUT)
            .all(|(&byte, &expected)| match expected {
                b'd' => byte.is_ascii_digit(),
                literal => byte == literal,
            })
}

/// Parse a `last_activity` value into a UTC instant.
pub fn parse_activity_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let format_error = || AutostopError::Format {
        value: value.to_string(),
        expected: ACTIVITY_TIMESTAMP_FORMAT,
    };

    let body = value
        .strip_suffix(|c: char| c == 'z' || c == 'Z')
        .ok_or_else(format_error)?;

    // chrono tolerates padding and signed years, so the shape is checked first
    if !matches_layout(body) {
        return Err(format_error());
    }

    NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| format_error())
}

/// Format a UTC instant in the activity wire format.
pub fn format_activity_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.6fz").to_string()
}

/// Idle iff strictly more than `threshold` has elapsed since `last_activity`.
///
/// Instants in the future (clock skew) are never idle.
pub fn is_instant_idle(last_activity: DateTime<Utc>, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(last_activity) > threshold
}

/// Parse `last_activity` and apply [`is_instant_idle`].
pub fn is_timestamp_idle(last_activity: &str, threshold: TimeDelta, now: DateTime<Utc>) -> Result<bool> {
    let instant = parse_activity_timestamp(last_activity)?;
    Ok(is_instant_idle(instant, threshold, now))
}
