//! [`DriverLoop`] – the acquisition pipeline.
//!
//! Two cooperating tasks replace a single blocking receive loop:
//!
//! 1. **Ingestion** ([`spawn_ingestion`]) owns the [`TelemetrySource`],
//!    connects it under the configured [`RetryPolicy`], stamps every reading
//!    with its receipt time and pushes it into a bounded `mpsc` channel.
//!    Transport failures trigger a reconnect after the policy's delay; the
//!    failure streak spans sessions and only a delivered reading clears it.
//!    Malformed readings are counted and dropped.
//! 2. **Processing** ([`DriverLoop::process`]) drains the channel.  For each
//!    reading it runs the geometry transform, appends the points to the
//!    owned [`PointBuffer`], records the raw reading and publishes an
//!    immutable [`CloudSnapshot`] to the render sink.
//!
//! Rendering happens elsewhere, at its own cadence, by reading the latest
//! snapshot from the sink.  Recorder and sink failures are logged and
//! counted; they never stop ingestion.
//!
//! # Example
//!
//! ```rust,no_run
//! use echoscan_cockpit::SnapshotChannel;
//! use echoscan_memory::NullRecorder;
//! use echoscan_middleware::SimulatedSource;
//! use echoscan_runtime::driver::{DriverConfig, DriverLoop};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (_stop_tx, stop_rx) = watch::channel(false);
//!     let driver = DriverLoop::new(DriverConfig::default(), NullRecorder, SnapshotChannel::new());
//!     let report = driver.run(SimulatedSource::new().with_limit(100), stop_rx).await;
//!     println!("{} readings processed", report.driver.processed);
//! }
//! ```

use chrono::{DateTime, Utc};
use echoscan_cockpit::RenderSink;
use echoscan_memory::Recorder;
use echoscan_middleware::TelemetrySource;
use echoscan_perception::{DEFAULT_CAPACITY, PointBuffer, transform};
use echoscan_types::{CloudSnapshot, Reading, ScanError, SensorMount};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::retry::{
    Backoff, ConnectOutcome, RetryPolicy, backoff, connect_after_failures, shutdown_requested,
};

/// Default depth of the ingestion → processing channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A reading paired with the time it arrived.
pub type Stamped = (DateTime<Utc>, Reading);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`DriverLoop`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Sensor placement; output points follow this order.
    pub mounts: Vec<SensorMount>,
    /// Maximum number of retained points.
    pub buffer_capacity: usize,
    /// Readings that may queue between ingestion and processing.
    pub channel_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mounts: SensorMount::default_rig(),
            buffer_capacity: DEFAULT_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Why ingestion stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StopReason {
    /// Shutdown was requested (or the processing side went away).
    #[default]
    Shutdown,
    /// The source reported it has no more data.
    Exhausted(String),
    /// Reconnecting failed for good.
    Failed(ScanError),
}

/// Counters kept by the ingestion task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    /// Readings parsed and forwarded to processing.
    pub received: u64,
    /// Readings dropped as malformed.
    pub malformed: u64,
    /// Successful reconnects after a lost connection.
    pub reconnects: u64,
    pub stop: StopReason,
}

/// Counters kept by [`DriverLoop::process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub processed: u64,
    pub points_emitted: u64,
    pub recorder_failures: u64,
    pub render_failures: u64,
}

/// Summary returned by [`DriverLoop::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub ingest: IngestStats,
    pub driver: DriverStats,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingestion task
// ─────────────────────────────────────────────────────────────────────────────

/// Spawn the ingestion task.
///
/// The task ends when shutdown is requested, `tx`'s receiver is dropped, the
/// source is exhausted or the retry budget is spent; the reason is recorded
/// in [`IngestStats::stop`].
pub fn spawn_ingestion<S>(
    mut source: S,
    retry: RetryPolicy,
    tx: mpsc::Sender<Stamped>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<IngestStats>
where
    S: TelemetrySource + 'static,
{
    tokio::spawn(async move {
        let name = source.describe();
        let mut stats = IngestStats::default();
        let mut connected_before = false;
        // Consecutive failures charged against `retry`, across sessions.
        let mut failures = 0u32;

        'session: loop {
            match connect_after_failures(&mut source, &retry, &mut failures, &mut shutdown).await {
                Ok(ConnectOutcome::Connected { .. }) => {
                    if connected_before {
                        stats.reconnects += 1;
                    }
                    connected_before = true;
                }
                Ok(ConnectOutcome::Shutdown) => {
                    stats.stop = StopReason::Shutdown;
                    break;
                }
                Err(ScanError::SourceExhausted(details)) => {
                    stats.stop = StopReason::Exhausted(details);
                    break;
                }
                Err(e) => {
                    error!(source = %name, error = %e, "telemetry source unavailable");
                    stats.stop = StopReason::Failed(e);
                    break;
                }
            }

            loop {
                let next = tokio::select! {
                    r = source.next_reading() => Some(r),
                    _ = shutdown_requested(&mut shutdown) => None,
                };
                let Some(next) = next else {
                    stats.stop = StopReason::Shutdown;
                    break 'session;
                };

                match next {
                    Ok(reading) => {
                        failures = 0;
                        let received_at = Utc::now();
                        stats.received += 1;
                        if tx.send((received_at, reading)).await.is_err() {
                            debug!("processing side closed; stopping ingestion");
                            stats.stop = StopReason::Shutdown;
                            break 'session;
                        }
                    }
                    Err(ScanError::MalformedReading(details)) => {
                        stats.malformed += 1;
                        warn!(source = %name, %details, "dropping malformed reading");
                    }
                    Err(ScanError::SourceExhausted(details)) => {
                        info!(source = %name, %details, "telemetry source exhausted");
                        stats.stop = StopReason::Exhausted(details);
                        break 'session;
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(source = %name, error = %e, "connection lost");
                        failures = failures.saturating_add(1);
                        match backoff(&name, &retry, failures, &e, &mut shutdown).await {
                            Backoff::Elapsed => continue 'session,
                            Backoff::Shutdown => {
                                stats.stop = StopReason::Shutdown;
                                break 'session;
                            }
                            Backoff::Exhausted => {
                                error!(source = %name, error = %e, "telemetry source unavailable");
                                stats.stop = StopReason::Failed(e);
                                break 'session;
                            }
                        }
                    }
                    Err(e) => {
                        error!(source = %name, error = %e, "unrecoverable source error");
                        stats.stop = StopReason::Failed(e);
                        break 'session;
                    }
                }
            }
        }

        info!(
            source = %name,
            received = stats.received,
            malformed = stats.malformed,
            reconnects = stats.reconnects,
            "ingestion stopped"
        );
        stats
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// DriverLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Single writer of the point buffer.
///
/// Owns the [`PointBuffer`], the [`Recorder`] and the [`RenderSink`].
pub struct DriverLoop<R, K> {
    mounts: Vec<SensorMount>,
    buffer: PointBuffer,
    recorder: R,
    sink: K,
    channel_capacity: usize,
    retry: RetryPolicy,
    stats: DriverStats,
}

impl<R: Recorder, K: RenderSink> DriverLoop<R, K> {
    pub fn new(config: DriverConfig, recorder: R, sink: K) -> Self {
        Self {
            mounts: config.mounts,
            buffer: PointBuffer::new(config.buffer_capacity),
            recorder,
            sink,
            // mpsc::channel panics on zero capacity.
            channel_capacity: config.channel_capacity.max(1),
            retry: config.retry,
            stats: DriverStats::default(),
        }
    }

    pub fn buffer(&self) -> &PointBuffer {
        &self.buffer
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Handle one reading: transform, append, record, publish.
    ///
    /// Returns the snapshot handed to the sink.  Never fails; collaborator
    /// errors are logged and counted.
    pub fn process(&mut self, received_at: DateTime<Utc>, reading: &Reading) -> CloudSnapshot {
        let points = transform(reading, &self.mounts);
        self.buffer.append(&points);

        self.stats.processed += 1;
        self.stats.points_emitted += points.len() as u64;

        if let Err(e) = self.recorder.append(received_at, reading) {
            self.stats.recorder_failures += 1;
            warn!(error = %e, "failed to record reading");
        }

        let snapshot = CloudSnapshot::new(self.stats.processed, self.buffer.snapshot());
        if let Err(e) = self.sink.render(&snapshot) {
            self.stats.render_failures += 1;
            warn!(error = %e, "render sink rejected snapshot");
        }

        debug!(
            seq = snapshot.seq,
            retained = snapshot.len(),
            yaw = reading.orientation.yaw,
            "reading processed"
        );
        snapshot
    }

    /// Run the pipeline until shutdown, exhaustion or a spent retry budget.
    ///
    /// Readings already queued when ingestion stops are still processed.
    /// The recorder is flushed before returning.
    pub async fn run<S>(mut self, source: S, mut shutdown: watch::Receiver<bool>) -> RunReport
    where
        S: TelemetrySource + 'static,
    {
        info!(
            source = %source.describe(),
            mounts = self.mounts.len(),
            capacity = self.buffer.capacity(),
            "driver loop starting"
        );

        let (tx, mut rx) = mpsc::channel(self.channel_capacity);
        let ingestion = spawn_ingestion(source, self.retry, tx, shutdown.clone());

        loop {
            let next = tokio::select! {
                msg = rx.recv() => msg,
                _ = shutdown_requested(&mut shutdown) => None,
            };
            match next {
                Some((received_at, reading)) => {
                    self.process(received_at, &reading);
                }
                None => break,
            }
        }
        // Stop ingestion blocking on a full channel, then drain what is left.
        rx.close();
        while let Some((received_at, reading)) = rx.recv().await {
            self.process(received_at, &reading);
        }

        let ingest = match ingestion.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "ingestion task panicked");
                IngestStats {
                    stop: StopReason::Failed(ScanError::transport("ingestion", e)),
                    ..IngestStats::default()
                }
            }
        };

        if let Err(e) = self.recorder.flush() {
            self.stats.recorder_failures += 1;
            warn!(error = %e, "failed to flush recorder");
        }

        info!(
            processed = self.stats.processed,
            retained = self.buffer.len(),
            "driver loop stopped"
        );
        RunReport {
            ingest,
            driver: self.stats,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
