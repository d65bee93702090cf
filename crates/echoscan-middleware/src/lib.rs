//! `echoscan-middleware` – telemetry transports.
//!
//! Pulls raw readings off the wire without caring what they mean.
//!
//! # Modules
//!
//! - [`source`] – the [`TelemetrySource`] trait the driver loop consumes.
//! - [`parser`] – [`parse_reading`]: JSON payload decoding shared by every
//!   transport.
//! - [`ws_source`] – [`WebSocketSource`]: one reading per WebSocket frame.
//! - [`tcp_source`] – [`TcpLineSource`]: line-delimited JSON over TCP.
//! - [`sim_source`] – [`SimulatedSource`] and [`ScriptedSource`] for running
//!   without hardware.

pub mod parser;
pub mod sim_source;
pub mod source;
pub mod tcp_source;
pub mod ws_source;

pub use parser::parse_reading;
pub use sim_source::{ScriptedSource, SimulatedSource};
pub use source::TelemetrySource;
pub use tcp_source::TcpLineSource;
pub use ws_source::WebSocketSource;
