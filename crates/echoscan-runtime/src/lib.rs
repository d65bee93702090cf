//! `echoscan-runtime` – the acquisition engine.
//!
//! Wires a telemetry source, the geometry engine, the point buffer, a
//! recorder and a render sink into one running pipeline.
//!
//! # Modules
//!
//! - [`driver`] – [`DriverLoop`][driver::DriverLoop]: the single writer of
//!   the point buffer, fed by an ingestion task over a bounded channel.
//! - [`retry`] – [`RetryPolicy`][retry::RetryPolicy] and
//!   [`connect_with_retry`][retry::connect_with_retry]: bounded or unbounded,
//!   cancellable reconnect schedule.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod driver;
pub mod retry;
pub mod telemetry;

pub use driver::{
    DriverConfig, DriverLoop, DriverStats, IngestStats, RunReport, StopReason, spawn_ingestion,
};
pub use retry::{
    Backoff, ConnectOutcome, RetryPolicy, backoff, connect_after_failures, connect_with_retry,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
