//! Wire decoding for rig telemetry.
//!
//! Every transport carries the same payload: one flat JSON object per
//! reading with the fields `distanceTopLeft`, `distanceTopRight`,
//! `distanceBottomLeft`, `distanceBottomRight`, `pitch`, `roll` and `yaw`.
//! Extra fields are ignored.

use echoscan_types::{Reading, ScanError};

/// Maximum accepted payload size for a single reading.
///
/// A reading is well under 256 bytes; anything larger is rejected before it
/// reaches the JSON parser.
pub const MAX_READING_BYTES: usize = 4 * 1024;

/// Decode one reading from its JSON text.
///
/// Returns [`ScanError::MalformedReading`] for oversized payloads, invalid
/// JSON, and missing or non-numeric fields.
pub fn parse_reading(text: &str) -> Result<Reading, ScanError> {
    if text.len() > MAX_READING_BYTES {
        return Err(ScanError::MalformedReading(format!(
            "payload is {} bytes, exceeding the limit of {}",
            text.len(),
            MAX_READING_BYTES
        )));
    }
    serde_json::from_str::<Reading>(text.trim())
        .map_err(|e| ScanError::MalformedReading(e.to_string()))
}
