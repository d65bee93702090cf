//! In-process telemetry sources for demos, CI and tests.
//!
//! * [`SimulatedSource`] synthesises a slowly turning rig looking at a wall
//!   of varying depth, so the full pipeline can run without hardware.
//! * [`ScriptedSource`] replays a fixed queue of results (including failures)
//!   to exercise the driver's error handling deterministically.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use echoscan_types::{Orientation, Reading, ScanError, SensorDistances};

use crate::source::TelemetrySource;

// ────────────────────────────────────────────────────────────────────────────
// SimulatedSource
// ────────────────────────────────────────────────────────────────────────────

/// Deterministic synthetic rig.
///
/// Each reading advances yaw by `yaw_step_deg`; pitch and roll wobble by a few
/// degrees; distances oscillate around `base_distance_cm`.
pub struct SimulatedSource {
    seq: u64,
    limit: Option<u64>,
    interval: Duration,
    yaw_step_deg: f64,
    base_distance_cm: f64,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            seq: 0,
            limit: None,
            interval: Duration::from_millis(50),
            yaw_step_deg: 3.0,
            base_distance_cm: 120.0,
        }
    }

    /// Stop with [`ScanError::SourceExhausted`] after `limit` readings.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Delay before each reading (zero disables pacing).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_yaw_step(mut self, degrees: f64) -> Self {
        self.yaw_step_deg = degrees;
        self
    }

    /// The reading produced for step `seq`.
    pub fn reading_at(&self, seq: u64) -> Reading {
        let t = seq as f64;
        let yaw = (t * self.yaw_step_deg) % 360.0;
        let wall = |phase: f64| self.base_distance_cm + 40.0 * (t * 0.1 + phase).sin();
        Reading::new(
            SensorDistances {
                top_left: wall(0.0),
                top_right: wall(0.4),
                bottom_left: wall(0.8),
                bottom_right: wall(1.2),
            },
            Orientation::new(8.0 * (t * 0.05).sin(), 4.0 * (t * 0.07).cos(), yaw),
        )
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for SimulatedSource {
    fn describe(&self) -> String {
        "sim://rig".to_string()
    }

    async fn connect(&mut self) -> Result<(), ScanError> {
        Ok(())
    }

    async fn next_reading(&mut self) -> Result<Reading, ScanError> {
        if let Some(limit) = self.limit
            && self.seq >= limit
        {
            return Err(ScanError::SourceExhausted(format!(
                "simulation finished after {limit} readings"
            )));
        }
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        let reading = self.reading_at(self.seq);
        self.seq += 1;
        Ok(reading)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedSource
// ────────────────────────────────────────────────────────────────────────────

/// Replays a queue of scripted outcomes, then reports
/// [`ScanError::SourceExhausted`].
#[derive(Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<Reading, ScanError>>,
    connect_failures: u32,
    connects: u32,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<Reading, ScanError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Make the first `n` calls to `connect` fail with a transport error.
    pub fn failing_connects(mut self, n: u32) -> Self {
        self.connect_failures = n;
        self
    }

    /// Number of `connect` calls made so far (successful or not).
    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    fn describe(&self) -> String {
        "script://".to_string()
    }

    async fn connect(&mut self) -> Result<(), ScanError> {
        self.connects += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(ScanError::transport("script://", "scripted connect failure"));
        }
        Ok(())
    }

    async fn next_reading(&mut self) -> Result<Reading, ScanError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(ScanError::SourceExhausted("script finished".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_types::SensorId;

    #[tokio::test]
    async fn simulated_source_respects_limit() {
        let mut sim = SimulatedSource::new()
            .with_interval(Duration::ZERO)
            .with_limit(3);
        sim.connect().await.unwrap();
        for _ in 0..3 {
            assert!(sim.next_reading().await.is_ok());
        }
        assert!(matches!(
            sim.next_reading().await,
            Err(ScanError::SourceExhausted(_))
        ));
    }

    #[test]
    fn simulated_readings_are_deterministic() {
        let sim = SimulatedSource::new().with_yaw_step(5.0);
        assert_eq!(sim.reading_at(7), sim.reading_at(7));
        assert_eq!(sim.reading_at(2).orientation.yaw, 10.0);
        assert_eq!(sim.reading_at(72).orientation.yaw, 0.0);
    }

    #[test]
    fn simulated_distances_stay_positive() {
        let sim = SimulatedSource::new();
        for seq in 0..500 {
            let r = sim.reading_at(seq);
            for id in SensorId::ALL {
                assert!(r.distance(id) > 0.0);
            }
        }
    }

    #[tokio::test]
    async fn scripted_source_replays_then_exhausts() {
        let mut src = ScriptedSource::new(vec![
            Ok(Reading::default()),
            Err(ScanError::MalformedReading("bad".into())),
        ]);
        assert!(src.next_reading().await.is_ok());
        assert!(matches!(
            src.next_reading().await,
            Err(ScanError::MalformedReading(_))
        ));
        assert!(matches!(
            src.next_reading().await,
            Err(ScanError::SourceExhausted(_))
        ));
        assert_eq!(src.remaining(), 0);
    }

    #[tokio::test]
    async fn scripted_connect_failures() {
        let mut src = ScriptedSource::new(vec![]).failing_connects(2);
        assert!(src.connect().await.is_err());
        assert!(src.connect().await.is_err());
        assert!(src.connect().await.is_ok());
        assert_eq!(src.connects(), 3);
    }
}
