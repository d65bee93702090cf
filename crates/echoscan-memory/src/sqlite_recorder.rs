//! SQLite reading log.
//!
//! Persists readings to a local SQLite database so several acquisition runs
//! can share one file.  Every [`SqliteRecorder`] instance tags its rows with
//! a fresh session UUID.
//!
//! # Storage layout
//!
//! | column                | type    | description                         |
//! |-----------------------|---------|-------------------------------------|
//! | id                    | INTEGER | insertion order                     |
//! | session               | TEXT    | UUID v4 of the recording session    |
//! | timestamp             | TEXT    | RFC-3339 receipt time (UTC)         |
//! | distance_top_left …   | REAL    | the four raw distances (cm)         |
//! | pitch, roll, yaw      | REAL    | attitude (degrees)                  |
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use echoscan_memory::{Recorder, SqliteRecorder};
//! use echoscan_types::Reading;
//!
//! let mut rec = SqliteRecorder::open_in_memory().unwrap();
//! rec.append(Utc::now(), &Reading::default()).unwrap();
//! assert_eq!(rec.rows().unwrap().len(), 1);
//! ```

use chrono::{DateTime, Utc};
use echoscan_types::{Orientation, Reading, SensorDistances};
use rusqlite::{Connection, params};
use tracing::info;
use uuid::Uuid;

use crate::recorder::{RecordRow, Recorder, RecorderError};

/// SQLite-backed [`Recorder`].
pub struct SqliteRecorder {
    conn: Connection,
    session: Uuid,
}

impl SqliteRecorder {
    /// Open (or create) a database at `path`.
    pub fn open(path: &str) -> Result<Self, RecorderError> {
        let recorder = Self::init(Connection::open(path)?)?;
        info!(path, session = %recorder.session, "sqlite recorder opened");
        Ok(recorder)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, RecorderError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RecorderError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sensor_readings (
                id                    INTEGER PRIMARY KEY AUTOINCREMENT,
                session               TEXT NOT NULL,
                timestamp             TEXT NOT NULL,
                distance_top_left     REAL NOT NULL,
                distance_top_right    REAL NOT NULL,
                distance_bottom_left  REAL NOT NULL,
                distance_bottom_right REAL NOT NULL,
                pitch                 REAL NOT NULL,
                roll                  REAL NOT NULL,
                yaw                   REAL NOT NULL
            );",
        )?;
        Ok(Self {
            conn,
            session: Uuid::new_v4(),
        })
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// All rows of this session in insertion order.
    pub fn rows(&self) -> Result<Vec<RecordRow>, RecorderError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, distance_top_left, distance_top_right,
                    distance_bottom_left, distance_bottom_right, pitch, roll, yaw
             FROM sensor_readings
             WHERE session = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![self.session.to_string()], |row| {
            let ts: String = row.get(0)?;
            let reading = Reading::new(
                SensorDistances {
                    top_left: row.get(1)?,
                    top_right: row.get(2)?,
                    bottom_left: row.get(3)?,
                    bottom_right: row.get(4)?,
                },
                Orientation::new(row.get(5)?, row.get(6)?, row.get(7)?),
            );
            Ok((ts, reading))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (ts, reading) = row?;
            let timestamp = ts
                .parse::<DateTime<Utc>>()
                .map_err(|e| RecorderError::CorruptRow(format!("timestamp '{ts}': {e}")))?;
            out.push(RecordRow::new(timestamp, reading));
        }
        Ok(out)
    }
}

impl Recorder for SqliteRecorder {
    fn append(&mut self, timestamp: DateTime<Utc>, reading: &Reading) -> Result<(), RecorderError> {
        let d = &reading.distances;
        let o = &reading.orientation;
        self.conn.execute(
            "INSERT INTO sensor_readings
                 (session, timestamp, distance_top_left, distance_top_right,
                  distance_bottom_left, distance_bottom_right, pitch, roll, yaw)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.session.to_string(),
                timestamp.to_rfc3339(),
                d.top_left,
                d.top_right,
                d.bottom_left,
                d.bottom_right,
                o.pitch,
                o.roll,
                o.yaw,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(yaw: f64) -> Reading {
        Reading::new(SensorDistances::uniform(25.0), Orientation::new(1.0, 2.0, yaw))
    }

    #[test]
    fn rows_round_trip_in_insertion_order() {
        let mut rec = SqliteRecorder::open_in_memory().unwrap();
        let t0 = Utc::now();
        for yaw in [10.0, 20.0, 30.0] {
            rec.append(t0, &reading(yaw)).unwrap();
        }
        let rows = rec.rows().unwrap();
        let yaws: Vec<_> = rows.iter().map(|r| r.reading.orientation.yaw).collect();
        assert_eq!(yaws, [10.0, 20.0, 30.0]);
        assert_eq!(rows[0].timestamp, t0);
        assert_eq!(rows[0].reading, reading(10.0));
    }

    #[test]
    fn empty_session_has_no_rows() {
        let rec = SqliteRecorder::open_in_memory().unwrap();
        assert!(rec.rows().unwrap().is_empty());
    }

    #[test]
    fn sessions_are_isolated_in_shared_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("readings.db");
        let path = path.to_string_lossy();

        let mut first = SqliteRecorder::open(&path).unwrap();
        first.append(Utc::now(), &reading(1.0)).unwrap();
        first.append(Utc::now(), &reading(2.0)).unwrap();

        let mut second = SqliteRecorder::open(&path).unwrap();
        second.append(Utc::now(), &reading(3.0)).unwrap();

        assert_ne!(first.session(), second.session());
        assert_eq!(first.rows().unwrap().len(), 2);
        assert_eq!(second.rows().unwrap().len(), 1);
    }
}
