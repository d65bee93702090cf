//! [`PointBuffer`] – bounded rolling store of recent points.
//!
//! Points are kept in insertion order.  When an append pushes the length past
//! the capacity, the oldest points are evicted from the front until exactly
//! `capacity` remain.
//!
//! # Example
//!
//! ```rust
//! use echoscan_perception::point_buffer::PointBuffer;
//! use echoscan_types::Point3D;
//!
//! let mut buf = PointBuffer::new(3);
//! buf.append(&[Point3D::new(1.0, 0.0, 0.0), Point3D::new(2.0, 0.0, 0.0)]);
//! buf.append(&[Point3D::new(3.0, 0.0, 0.0), Point3D::new(4.0, 0.0, 0.0)]);
//!
//! let xs: Vec<f64> = buf.snapshot().iter().map(|p| p.x).collect();
//! assert_eq!(xs, [2.0, 3.0, 4.0]);
//! ```

use std::collections::VecDeque;

use echoscan_types::Point3D;
use tracing::trace;

/// Capacity used by [`PointBuffer::default`].
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Insertion-ordered, capacity-bounded FIFO of [`Point3D`] values.
///
/// The capacity is fixed at construction.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    capacity: usize,
    points: VecDeque<Point3D>,
    /// Total number of points dropped since construction.
    evicted: u64,
}

impl PointBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            evicted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points evicted so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Append `points` in order, then trim the oldest entries so that the
    /// length does not exceed the capacity.  Appending an empty slice is a
    /// no-op.
    pub fn append(&mut self, points: &[Point3D]) {
        if points.is_empty() {
            return;
        }
        self.points.extend(points.iter().copied());

        let overflow = self.points.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.points.drain(..overflow);
            self.evicted += overflow as u64;
            trace!(overflow, len = self.points.len(), "point buffer evicted oldest points");
        }
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Point3D> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for PointBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
