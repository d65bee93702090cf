use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one of the four ranging sensors mounted on the rig.
///
/// The declaration order is the iteration order used everywhere a reading is
/// expanded into points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorId {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl SensorId {
    /// All sensors in their fixed declared order.
    pub const ALL: [SensorId; 4] = [
        SensorId::TopLeft,
        SensorId::TopRight,
        SensorId::BottomLeft,
        SensorId::BottomRight,
    ];

    /// Config / log name, e.g. `"top_left"`.
    pub fn name(self) -> &'static str {
        match self {
            SensorId::TopLeft => "top_left",
            SensorId::TopRight => "top_right",
            SensorId::BottomLeft => "bottom_left",
            SensorId::BottomRight => "bottom_right",
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point (or displacement) in the world frame, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// Euclidean length of the vector from the origin.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Physical placement of a sensor on the rig.
///
/// The offset is fixed at construction and never changes for the lifetime of
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorMount {
    pub id: SensorId,
    /// Translation from the rig origin to the sensor (cm).
    pub offset: Point3D,
}

impl SensorMount {
    pub fn new(id: SensorId, offset: Point3D) -> Self {
        Self { id, offset }
    }

    /// The stock rig: four sensors on a 10 cm square centred on the origin.
    pub fn default_rig() -> Vec<SensorMount> {
        vec![
            SensorMount::new(SensorId::TopLeft, Point3D::new(-5.0, 5.0, 0.0)),
            SensorMount::new(SensorId::TopRight, Point3D::new(5.0, 5.0, 0.0)),
            SensorMount::new(SensorId::BottomLeft, Point3D::new(-5.0, -5.0, 0.0)),
            SensorMount::new(SensorId::BottomRight, Point3D::new(5.0, -5.0, 0.0)),
        ]
    }
}

/// Rig attitude in degrees. Values are neither range-checked nor wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl Orientation {
    pub fn new(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Returns `(pitch, roll, yaw)` in radians.
    pub fn to_radians(self) -> (f64, f64, f64) {
        (
            self.pitch.to_radians(),
            self.roll.to_radians(),
            self.yaw.to_radians(),
        )
    }
}

/// Raw distances reported by the four sensors (cm).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorDistances {
    #[serde(rename = "distanceTopLeft")]
    pub top_left: f64,
    #[serde(rename = "distanceTopRight")]
    pub top_right: f64,
    #[serde(rename = "distanceBottomLeft")]
    pub bottom_left: f64,
    #[serde(rename = "distanceBottomRight")]
    pub bottom_right: f64,
}

impl SensorDistances {
    /// Same distance on every sensor.
    pub fn uniform(distance: f64) -> Self {
        Self {
            top_left: distance,
            top_right: distance,
            bottom_left: distance,
            bottom_right: distance,
        }
    }

    pub fn get(&self, id: SensorId) -> f64 {
        match id {
            SensorId::TopLeft => self.top_left,
            SensorId::TopRight => self.top_right,
            SensorId::BottomLeft => self.bottom_left,
            SensorId::BottomRight => self.bottom_right,
        }
    }
}

/// One telemetry sample.
///
/// On the wire this is a single flat JSON object:
///
/// ```json
/// {"distanceTopLeft": 10, "distanceTopRight": 10,
///  "distanceBottomLeft": 10, "distanceBottomRight": 10,
///  "pitch": 0, "roll": 0, "yaw": 90}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    #[serde(flatten)]
    pub distances: SensorDistances,
    #[serde(flatten)]
    pub orientation: Orientation,
}

impl Reading {
    pub fn new(distances: SensorDistances, orientation: Orientation) -> Self {
        Self {
            distances,
            orientation,
        }
    }

    pub fn distance(&self, id: SensorId) -> f64 {
        self.distances.get(id)
    }
}

/// Immutable view of the point cloud handed to render sinks.
#[derive(Debug, Clone)]
pub struct CloudSnapshot {
    /// Number of readings processed when the snapshot was taken.
    pub seq: u64,
    pub taken_at: DateTime<Utc>,
    pub points: Arc<[Point3D]>,
}

impl CloudSnapshot {
    pub fn new(seq: u64, points: Vec<Point3D>) -> Self {
        Self {
            seq,
            taken_at: Utc::now(),
            points: points.into(),
        }
    }

    /// The snapshot published before any reading arrives.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Error type shared by the acquisition pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Transport failure on {source_name}: {details}")]
    Transport { source_name: String, details: String },

    #[error("Malformed reading: {0}")]
    MalformedReading(String),

    #[error("Telemetry source exhausted: {0}")]
    SourceExhausted(String),

    #[error("Recorder failure: {0}")]
    Recorder(String),

    #[error("Render sink failure: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    pub fn transport(source_name: impl Into<String>, details: impl fmt::Display) -> Self {
        ScanError::Transport {
            source_name: source_name.into(),
            details: details.to_string(),
        }
    }

    /// `true` for failures the driver loop retries or skips past.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScanError::Transport { .. }
            | ScanError::MalformedReading(_)
            | ScanError::Recorder(_)
            | ScanError::Render(_) => true,
            ScanError::SourceExhausted(_) | ScanError::Config(_) => false,
        }
    }
}
