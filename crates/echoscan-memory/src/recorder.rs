//! The recorder contract.
//!
//! A [`Recorder`] is an append-only sink for raw readings.  Each row is the
//! wall-clock receipt time plus the seven raw fields, in this column order:
//!
//! | column | unit |
//! |---|---|
//! | `timestamp` | receipt time (UTC) |
//! | `distanceTopLeft` … `distanceBottomRight` | cm |
//! | `pitch`, `roll`, `yaw` | degrees |

use chrono::{DateTime, Utc};
use echoscan_types::{Reading, ScanError};
use thiserror::Error;

/// Column names shared by every tabular recorder.
pub const COLUMNS: [&str; 8] = [
    "timestamp",
    "distanceTopLeft",
    "distanceTopRight",
    "distanceBottomLeft",
    "distanceBottomRight",
    "pitch",
    "roll",
    "yaw",
];

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise while persisting readings.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<RecorderError> for ScanError {
    fn from(e: RecorderError) -> Self {
        ScanError::Recorder(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordRow
// ─────────────────────────────────────────────────────────────────────────────

/// One persisted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub timestamp: DateTime<Utc>,
    pub reading: Reading,
}

impl RecordRow {
    pub fn new(timestamp: DateTime<Utc>, reading: Reading) -> Self {
        Self { timestamp, reading }
    }

    /// The seven numeric fields in [`COLUMNS`] order (timestamp excluded).
    pub fn values(&self) -> [f64; 7] {
        let d = &self.reading.distances;
        let o = &self.reading.orientation;
        [
            d.top_left,
            d.top_right,
            d.bottom_left,
            d.bottom_right,
            o.pitch,
            o.roll,
            o.yaw,
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recorder
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only persistence for raw readings.
///
/// Rows must be durable once [`flush`][Recorder::flush] returns; the driver
/// calls it before shutting down.
pub trait Recorder: Send {
    /// Persist one reading received at `timestamp`.
    fn append(&mut self, timestamp: DateTime<Utc>, reading: &Reading) -> Result<(), RecorderError>;

    /// Force buffered rows to storage.
    fn flush(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn append(&mut self, timestamp: DateTime<Utc>, reading: &Reading) -> Result<(), RecorderError> {
        (**self).append(timestamp, reading)
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        (**self).flush()
    }
}

/// Recorder that discards everything (recording disabled).
#[derive(Debug, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn append(&mut self, _timestamp: DateTime<Utc>, _reading: &Reading) -> Result<(), RecorderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_types::{Orientation, SensorDistances};

    #[test]
    fn values_follow_column_order() {
        let row = RecordRow::new(
            Utc::now(),
            Reading::new(
                SensorDistances {
                    top_left: 1.0,
                    top_right: 2.0,
                    bottom_left: 3.0,
                    bottom_right: 4.0,
                },
                Orientation::new(5.0, 6.0, 7.0),
            ),
        );
        assert_eq!(row.values(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(COLUMNS.len(), row.values().len() + 1);
    }

    #[test]
    fn recorder_error_maps_to_scan_error() {
        let err: ScanError = RecorderError::CorruptRow("bad timestamp".into()).into();
        assert!(matches!(err, ScanError::Recorder(ref s) if s.contains("bad timestamp")));
    }

    #[test]
    fn null_recorder_accepts_everything() {
        let mut rec: Box<dyn Recorder> = Box::new(NullRecorder);
        assert!(rec.append(Utc::now(), &Reading::default()).is_ok());
        assert!(rec.flush().is_ok());
    }
}
