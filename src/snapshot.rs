//! Immutable presented-list snapshots and the stream that carries them.

use crate::state::{LoadState, LoadStates};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Immutable presented-list state with attached load states.
///
/// A snapshot is the unit handed to the differ: an ordered run of real items
/// framed by leading/trailing placeholder counts, plus the source's load
/// states at the moment the snapshot was produced. Cloning is cheap (the
/// item vector is shared).
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    items: Arc<Vec<T>>,
    placeholders_before: usize,
    placeholders_after: usize,
    states: LoadStates,
}

impl<T> Snapshot<T> {
    /// Build a snapshot from loaded items, placeholder counts and states.
    pub fn new(
        items: Arc<Vec<T>>,
        placeholders_before: usize,
        placeholders_after: usize,
        states: LoadStates,
    ) -> Self {
        Self {
            items,
            placeholders_before,
            placeholders_after,
            states,
        }
    }

    /// The canonical empty snapshot: no items, no placeholders, refresh
    /// idle and both pagination directions exhausted.
    pub fn empty() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            placeholders_before: 0,
            placeholders_after: 0,
            states: LoadStates {
                refresh: LoadState::not_loading(),
                prepend: LoadState::complete(),
                append: LoadState::complete(),
            },
        }
    }

    /// Shared loaded items.
    pub fn items(&self) -> &Arc<Vec<T>> {
        &self.items
    }

    /// Number of placeholder positions before the loaded run.
    pub fn placeholders_before(&self) -> usize {
        self.placeholders_before
    }

    /// Number of placeholder positions after the loaded run.
    pub fn placeholders_after(&self) -> usize {
        self.placeholders_after
    }

    /// Load states attached to this snapshot.
    pub fn states(&self) -> &LoadStates {
        &self.states
    }

    /// Total displayed positions: placeholders plus real items.
    pub fn item_count(&self) -> usize {
        self.placeholders_before + self.items.len() + self.placeholders_after
    }

    /// Item at a displayed position, `None` for placeholders.
    pub fn get(&self, index: usize) -> Option<&T> {
        index
            .checked_sub(self.placeholders_before)
            .and_then(|i| self.items.get(i))
    }
}

/// Prefetch and control hints flowing from the differ back to the upstream
/// driver of the active snapshot stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadHint {
    /// A consumer accessed the given displayed position.
    Access {
        /// Displayed position that was read.
        index: usize,
    },
    /// Invalidate the current generation and reload from scratch.
    Refresh,
    /// Re-run failed loads, re-entering `Loading` in their directions.
    Retry,
}

/// One submission's worth of snapshots, with a back-channel for load hints.
///
/// The stream ends when the producing generation ends (for example on
/// invalidation); hints sent after that are dropped silently.
pub struct SnapshotStream<T> {
    snapshots: mpsc::UnboundedReceiver<Snapshot<T>>,
    hints: mpsc::UnboundedSender<LoadHint>,
}

impl<T> SnapshotStream<T> {
    /// Create a connected producer/consumer pair.
    pub fn channel() -> (SnapshotSender<T>, Self) {
        let (snap_tx, snap_rx) = mpsc::unbounded_channel();
        let (hint_tx, hint_rx) = mpsc::unbounded_channel();
        (
            SnapshotSender {
                snapshots: snap_tx,
                hints: hint_rx,
            },
            Self {
                snapshots: snap_rx,
                hints: hint_tx,
            },
        )
    }

    /// A stream that yields exactly the given snapshots, then ends.
    pub fn of(snapshots: impl IntoIterator<Item = Snapshot<T>>) -> Self {
        let (sender, stream) = Self::channel();
        for snapshot in snapshots {
            let _ = sender.send(snapshot);
        }
        stream
    }

    /// A stream yielding the canonical empty snapshot, then ending.
    pub fn empty() -> Self {
        Self::of([Snapshot::empty()])
    }

    /// Receive the next snapshot; `None` when the producer is done.
    pub async fn recv(&mut self) -> Option<Snapshot<T>> {
        self.snapshots.recv().await
    }

    /// Sender half of the hint back-channel.
    pub(crate) fn hint_sender(&self) -> mpsc::UnboundedSender<LoadHint> {
        self.hints.clone()
    }
}

impl<T> std::fmt::Debug for SnapshotStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream").finish_non_exhaustive()
    }
}

/// Producer half of a [`SnapshotStream`].
pub struct SnapshotSender<T> {
    snapshots: mpsc::UnboundedSender<Snapshot<T>>,
    hints: mpsc::UnboundedReceiver<LoadHint>,
}

impl<T> SnapshotSender<T> {
    /// Send a snapshot. Fails when the consumer side has been dropped,
    /// which producers treat as "keep running, nobody is watching".
    pub fn send(&self, snapshot: Snapshot<T>) -> Result<(), Box<Snapshot<T>>> {
        self.snapshots
            .send(snapshot)
            .map_err(|e| Box::new(e.0))
    }

    /// Receive the next hint from the consumer; `None` when the consumer
    /// half is gone.
    pub async fn recv_hint(&mut self) -> Option<LoadHint> {
        self.hints.recv().await
    }

    /// Whether the consumer half is still attached.
    pub fn is_connected(&self) -> bool {
        !self.snapshots.is_closed()
    }
}

impl<T> std::fmt::Debug for SnapshotSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSender").finish_non_exhaustive()
    }
}
