//! `echoscan-memory` – raw reading persistence.
//!
//! Every reading that reaches the driver is appended, untouched, to a flat
//! log so runs can be replayed or analysed offline.
//!
//! # Modules
//!
//! - [`recorder`] – the [`Recorder`] trait, shared column layout and
//!   [`NullRecorder`].
//! - [`csv_recorder`] – [`CsvRecorder`]: timestamped CSV file that opens in
//!   any spreadsheet.
//! - [`sqlite_recorder`] – [`SqliteRecorder`]: session-tagged rows in a local
//!   SQLite database.

pub mod csv_recorder;
pub mod recorder;
pub mod sqlite_recorder;

pub use csv_recorder::CsvRecorder;
pub use recorder::{COLUMNS, NullRecorder, RecordRow, Recorder, RecorderError};
pub use sqlite_recorder::SqliteRecorder;
