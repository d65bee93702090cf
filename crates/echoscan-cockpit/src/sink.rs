//! Render sinks.
//!
//! The driver hands every fresh [`CloudSnapshot`] to a [`RenderSink`].
//! [`SnapshotChannel`] is the standard sink: it stores the snapshot in a
//! [`tokio::sync::watch`] channel so any number of render tasks can pick up
//! the latest cloud at their own cadence without ever blocking ingestion.

use echoscan_types::{CloudSnapshot, ScanError};
use tokio::sync::watch;

/// Consumer of point-cloud snapshots.
pub trait RenderSink: Send {
    fn render(&mut self, snapshot: &CloudSnapshot) -> Result<(), ScanError>;
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn render(&mut self, snapshot: &CloudSnapshot) -> Result<(), ScanError> {
        (**self).render(snapshot)
    }
}

/// Latest-value snapshot channel.  Older snapshots are overwritten, never
/// queued.
#[derive(Debug)]
pub struct SnapshotChannel {
    tx: watch::Sender<CloudSnapshot>,
}

impl SnapshotChannel {
    /// Create a channel holding [`CloudSnapshot::empty`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CloudSnapshot::empty());
        Self { tx }
    }

    /// A new reader positioned at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<CloudSnapshot> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> CloudSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for SnapshotChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for SnapshotChannel {
    fn render(&mut self, snapshot: &CloudSnapshot) -> Result<(), ScanError> {
        // Publishing with no viewer attached is normal.
        self.tx.send_replace(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_types::Point3D;

    #[test]
    fn starts_with_empty_snapshot() {
        let channel = SnapshotChannel::new();
        assert!(channel.latest().is_empty());
        assert_eq!(channel.latest().seq, 0);
    }

    #[test]
    fn render_without_subscribers_succeeds() {
        let mut channel = SnapshotChannel::new();
        let snap = CloudSnapshot::new(1, vec![Point3D::new(1.0, 2.0, 3.0)]);
        assert!(channel.render(&snap).is_ok());
        assert_eq!(channel.latest().seq, 1);
    }

    #[tokio::test]
    async fn subscribers_see_only_latest() {
        let mut channel = SnapshotChannel::new();
        let mut rx = channel.subscribe();
        for seq in 1..=3 {
            channel
                .render(&CloudSnapshot::new(seq, vec![Point3D::default(); seq as usize]))
                .unwrap();
        }
        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.seq, 3);
        assert_eq!(snap.len(), 3);
        assert!(!rx.has_changed().unwrap());
    }
}
