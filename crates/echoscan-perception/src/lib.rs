//! `echoscan-perception` – turns raw rig telemetry into a point cloud.
//!
//! # Modules
//!
//! - [`geometry`] – [`transform`][geometry::transform]: pure mapping from one
//!   [`Reading`][echoscan_types::Reading] to one world-space point per sensor
//!   mount, using the composed `yaw · pitch · roll` rotation.
//! - [`point_buffer`] – [`PointBuffer`][point_buffer::PointBuffer]: bounded
//!   FIFO of the most recent points, owned by the driver loop.

pub mod geometry;
pub mod point_buffer;

pub use geometry::{composed_rotation, transform, Matrix3};
pub use point_buffer::{PointBuffer, DEFAULT_CAPACITY};
