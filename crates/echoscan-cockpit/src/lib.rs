//! `echoscan-cockpit` – live point-cloud rendering.
//!
//! The driver publishes each fresh [`CloudSnapshot`] into a
//! [`SnapshotChannel`]; the [`CockpitServer`] reads the latest snapshot at
//! its own refresh rate and streams it to every connected browser, where the
//! embedded viewer draws a rotatable 3-D scatter plot.
//!
//! Rendering is decoupled from ingestion: a slow or absent viewer never
//! stalls the driver, it simply skips intermediate snapshots.
//!
//! # Usage
//!
//! ```rust,no_run
//! use echoscan_cockpit::{CockpitServer, SnapshotChannel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let channel = SnapshotChannel::new();
//!     let server = CockpitServer::new(channel.subscribe());
//!     tokio::spawn(server.run());
//!     // hand `channel` to the driver as its RenderSink
//! }
//! ```
//!
//! [`CloudSnapshot`]: echoscan_types::CloudSnapshot

pub mod server;
pub mod sink;

pub use server::{CockpitServer, DEFAULT_PLOT_BOUND_CM, DEFAULT_PORT, DEFAULT_REFRESH_INTERVAL};
pub use sink::{RenderSink, SnapshotChannel};
