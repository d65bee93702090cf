//! The telemetry source contract.
//!
//! The driver loop never speaks a transport directly.  It pulls
//! [`Reading`]s from a [`TelemetrySource`]; each implementation hides its own
//! connection handling and wire decoding.
//!
//! # Overview
//!
//! - [`TelemetrySource`] – the trait every source implements.
//! - [`WebSocketSource`][crate::ws_source::WebSocketSource] – one JSON reading
//!   per WebSocket frame (the rig firmware's native transport).
//! - [`TcpLineSource`][crate::tcp_source::TcpLineSource] – line-delimited
//!   JSON over a raw TCP stream.
//! - [`SimulatedSource`][crate::sim_source::SimulatedSource] and
//!   [`ScriptedSource`][crate::sim_source::ScriptedSource] – in-process
//!   sources for demos and tests.

use async_trait::async_trait;
use echoscan_types::{Reading, ScanError};

/// A producer of raw telemetry readings.
///
/// # Contract
///
/// * `connect` – establishes (or re-establishes) the underlying transport.
///   Called by the driver before the first read and after every
///   [`ScanError::Transport`] failure.
///
/// * `next_reading` – suspends until the next reading arrives and returns it.
///   Errors are classified so the driver can react:
///   - [`ScanError::Transport`] – the link is gone; reconnect.
///   - [`ScanError::MalformedReading`] – drop this sample, keep reading.
///   - [`ScanError::SourceExhausted`] – no more data will ever arrive.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Human-readable label for logs (usually the endpoint URL).
    fn describe(&self) -> String;

    /// Open the transport.
    async fn connect(&mut self) -> Result<(), ScanError>;

    /// Receive the next reading.
    async fn next_reading(&mut self) -> Result<Reading, ScanError>;
}

#[async_trait]
impl<S: TelemetrySource + ?Sized> TelemetrySource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn connect(&mut self) -> Result<(), ScanError> {
        (**self).connect().await
    }

    async fn next_reading(&mut self) -> Result<Reading, ScanError> {
        (**self).next_reading().await
    }
}
