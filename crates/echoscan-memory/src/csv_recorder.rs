//! Spreadsheet-friendly CSV log.
//!
//! [`CsvRecorder`] writes a header row followed by one row per reading and
//! flushes after every row, so the file is complete even if the process is
//! killed.  Timestamps are Unix seconds with a millisecond fraction.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use echoscan_types::Reading;
use tracing::info;

use crate::recorder::{COLUMNS, RecordRow, Recorder, RecorderError};

/// File name for a log started at `started`, e.g.
/// `sensor_readings_20240301_123005.csv`.
pub fn file_name_for(started: DateTime<Local>) -> String {
    format!("sensor_readings_{}.csv", started.format("%Y%m%d_%H%M%S"))
}

/// Format `timestamp` as fractional Unix seconds (`1709296205.123`).
pub fn unix_seconds(timestamp: DateTime<Utc>) -> String {
    format!(
        "{}.{:03}",
        timestamp.timestamp(),
        timestamp.timestamp_subsec_millis()
    )
}

/// Appends readings to a CSV file.
pub struct CsvRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl CsvRecorder {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", COLUMNS.join(","))?;
        writer.flush()?;
        info!(path = %path.display(), "csv recorder created");
        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Create a timestamped log inside `dir`, creating the directory if
    /// needed.
    pub fn create_in(dir: impl AsRef<Path>, started: DateTime<Local>) -> Result<Self, RecorderError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Self::create(dir.join(file_name_for(started)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl Recorder for CsvRecorder {
    fn append(&mut self, timestamp: DateTime<Utc>, reading: &Reading) -> Result<(), RecorderError> {
        let row = RecordRow::new(timestamp, *reading);
        let mut line = unix_seconds(timestamp);
        for value in row.values() {
            line.push(',');
            line.push_str(&value.to_string());
        }
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}
