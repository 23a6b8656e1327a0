//! The presenting differ: consumes snapshot streams, keeps the displayed
//! list, and emits positional updates plus load-state aggregates.
//!
//! Submissions are single-flight in call order: `submit_data` claims its
//! generation before the returned future is first polled, so a later call
//! supersedes an earlier one even when the earlier future is polled later.
//! Superseding never cancels the caller's surrounding loop; the superseded
//! future simply completes.

use crate::aggregator::{ListenerHandle, LoadStateAggregator, LoadStateStream};
use crate::diff::{compute_list_diff, DiffCallback};
use crate::event::{ListUpdateCallback, ListUpdateEvent};
use crate::sequencer::{Submission, SubmissionSequencer};
use crate::snapshot::{LoadHint, Snapshot, SnapshotStream};
use crate::state::CombinedLoadStates;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Asynchronous single-flight differ over paged snapshots.
///
/// Clones share one presented list, one update callback, and one load-state
/// aggregator; any clone may submit, read, or observe.
pub struct PagingDiffer<T> {
    inner: Arc<DifferInner<T>>,
}

impl<T> Clone for PagingDiffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`PagingDiffer`].
pub struct PagingDifferBuilder<T> {
    diff_callback: Box<dyn DiffCallback<T>>,
    update_callback: Box<dyn ListUpdateCallback>,
    detect_moves: bool,
}

impl<T> PagingDifferBuilder<T> {
    /// Enable or disable move detection in the diff (off by default).
    pub fn detect_moves(mut self, detect: bool) -> Self {
        self.detect_moves = detect;
        self
    }

    /// Finish the builder.
    pub fn build(self) -> PagingDiffer<T> {
        PagingDiffer {
            inner: Arc::new(DifferInner {
                diff_callback: self.diff_callback,
                update_callback: Mutex::new(self.update_callback),
                detect_moves: self.detect_moves,
                sequencer: SubmissionSequencer::new(),
                presented: Mutex::new(Presented {
                    items: Arc::new(Vec::new()),
                    before: 0,
                    after: 0,
                }),
                item_count: AtomicUsize::new(0),
                aggregator: LoadStateAggregator::new(),
                present_lock: Mutex::new(()),
                hints: Mutex::new(None),
            }),
        }
    }
}

impl<T> std::fmt::Debug for PagingDifferBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingDifferBuilder")
            .field("detect_moves", &self.detect_moves)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> PagingDiffer<T> {
    /// Builder with the given diff and update callbacks.
    pub fn builder(
        diff_callback: impl DiffCallback<T> + 'static,
        update_callback: impl ListUpdateCallback + 'static,
    ) -> PagingDifferBuilder<T> {
        PagingDifferBuilder {
            diff_callback: Box::new(diff_callback),
            update_callback: Box::new(update_callback),
            detect_moves: false,
        }
    }

    /// Differ with default options.
    pub fn new(
        diff_callback: impl DiffCallback<T> + 'static,
        update_callback: impl ListUpdateCallback + 'static,
    ) -> Self {
        Self::builder(diff_callback, update_callback).build()
    }

    /// Consume one submission's snapshot stream.
    ///
    /// The generation is claimed here, synchronously: once `submit_data`
    /// returns, any in-flight earlier submission is superseded regardless of
    /// whether the returned future has been polled yet. The future completes
    /// when the stream ends or the submission is superseded.
    pub fn submit_data(
        &self,
        stream: SnapshotStream<T>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let mut submission = inner.sequencer.begin();
        inner.install_hints(submission.generation(), stream.hint_sender());
        let mut stream = stream;
        async move {
            loop {
                tokio::select! {
                    biased;
                    () = submission.superseded() => {
                        tracing::trace!(
                            generation = submission.generation(),
                            "submission superseded"
                        );
                        return;
                    }
                    snapshot = stream.recv() => match snapshot {
                        Some(snapshot) => {
                            if !inner.present(&submission, &snapshot) {
                                return;
                            }
                        }
                        None => return,
                    },
                }
            }
        }
    }

    /// Total displayed positions, placeholders included.
    ///
    /// Updated before list-update events and load-state aggregates are
    /// dispatched, so observers reading it from a callback see the
    /// post-update count.
    pub fn item_count(&self) -> usize {
        self.inner.item_count.load(Ordering::SeqCst)
    }

    /// Item at a displayed position, recording an access hint.
    ///
    /// Returns `None` for placeholder positions and out-of-bounds indices.
    pub fn get_item(&self, index: usize) -> Option<T> {
        self.inner.send_hint(LoadHint::Access { index });
        self.peek(index)
    }

    /// Item at a displayed position without recording an access.
    pub fn peek(&self, index: usize) -> Option<T> {
        let presented = self.inner.presented.lock();
        index
            .checked_sub(presented.before)
            .and_then(|i| presented.items.get(i))
            .cloned()
    }

    /// Copy of the full displayed list, `None` at placeholder positions.
    pub fn snapshot(&self) -> Vec<Option<T>> {
        let presented = self.inner.presented.lock();
        let mut out = Vec::with_capacity(
            presented.before + presented.items.len() + presented.after,
        );
        out.extend(std::iter::repeat_with(|| None).take(presented.before));
        out.extend(presented.items.iter().cloned().map(Some));
        out.extend(std::iter::repeat_with(|| None).take(presented.after));
        out
    }

    /// Ask the active generation's producer to invalidate and reload.
    pub fn refresh(&self) {
        self.inner.send_hint(LoadHint::Refresh);
    }

    /// Ask the active generation's producer to re-run failed loads.
    pub fn retry(&self) {
        self.inner.send_hint(LoadHint::Retry);
    }

    /// Register a synchronous load-state listener. No replay on
    /// registration; the listener observes aggregates dispatched after it
    /// attaches.
    pub fn add_load_state_listener(
        &self,
        listener: impl Fn(&CombinedLoadStates) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.inner.aggregator.add_listener(listener)
    }

    /// Detach a load-state listener.
    pub fn remove_load_state_listener(&self, handle: ListenerHandle) {
        self.inner.aggregator.remove_listener(handle);
    }

    /// Async stream observing the same aggregates as the listeners.
    pub fn load_state_stream(&self) -> LoadStateStream {
        self.inner.aggregator.state_stream()
    }

    /// Last dispatched load-state aggregate, if any.
    pub fn current_load_states(&self) -> Option<CombinedLoadStates> {
        self.inner.aggregator.current()
    }
}

impl<T> std::fmt::Debug for PagingDiffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let presented = self.inner.presented.lock();
        f.debug_struct("PagingDiffer")
            .field("items", &presented.items.len())
            .field("placeholders_before", &presented.before)
            .field("placeholders_after", &presented.after)
            .field("detect_moves", &self.inner.detect_moves)
            .finish_non_exhaustive()
    }
}

struct Presented<T> {
    items: Arc<Vec<T>>,
    before: usize,
    after: usize,
}

struct HintRoute {
    generation: u64,
    tx: mpsc::UnboundedSender<LoadHint>,
}

struct DifferInner<T> {
    diff_callback: Box<dyn DiffCallback<T>>,
    update_callback: Mutex<Box<dyn ListUpdateCallback>>,
    detect_moves: bool,
    sequencer: SubmissionSequencer,
    presented: Mutex<Presented<T>>,
    item_count: AtomicUsize,
    aggregator: LoadStateAggregator,
    // Serializes apply+emit pairs so interleaved submissions cannot
    // interleave their event batches.
    present_lock: Mutex<()>,
    hints: Mutex<Option<HintRoute>>,
}

impl<T: Clone + Send + Sync> DifferInner<T> {
    /// Route consumer hints to the given generation's producer. An older
    /// generation never displaces a newer route.
    fn install_hints(&self, generation: u64, tx: mpsc::UnboundedSender<LoadHint>) {
        let mut route = self.hints.lock();
        if route.as_ref().map_or(true, |r| generation > r.generation) {
            tracing::trace!(
                generation,
                active = self.sequencer.active_generation(),
                "hint route installed"
            );
            *route = Some(HintRoute { generation, tx });
        }
    }

    fn send_hint(&self, hint: LoadHint) {
        if let Some(route) = self.hints.lock().as_ref() {
            // The producer may already be gone; hints are best-effort.
            let _ = route.tx.send(hint);
        }
    }

    /// Apply one snapshot: diff, update the presented list, emit events,
    /// dispatch load states. Returns `false` when the submission has been
    /// superseded and must stop.
    fn present(&self, submission: &Submission, snapshot: &Snapshot<T>) -> bool {
        let _serialize = self.present_lock.lock();
        if submission.is_superseded() {
            return false;
        }

        let (old_items, old_before, old_after) = {
            let presented = self.presented.lock();
            (Arc::clone(&presented.items), presented.before, presented.after)
        };
        let old_total = old_before + old_items.len() + old_after;
        let new_total = snapshot.item_count();

        let unchanged_list = Arc::ptr_eq(&old_items, snapshot.items())
            && old_before == snapshot.placeholders_before()
            && old_after == snapshot.placeholders_after();

        let events: Vec<ListUpdateEvent> = if unchanged_list {
            // Pure load-state change; skip the diff entirely.
            Vec::new()
        } else if old_total == 0 {
            // Fast path: nothing was displayed, insert everything at once.
            if new_total == 0 {
                Vec::new()
            } else {
                vec![ListUpdateEvent::Inserted {
                    position: 0,
                    count: new_total,
                }]
            }
        } else if new_total == 0 {
            // Fast path: everything goes away at once.
            vec![ListUpdateEvent::Removed {
                position: 0,
                count: old_total,
            }]
        } else {
            self.placeholder_aware_diff(&old_items, old_before, old_after, snapshot)
        };

        // The diff may have taken a while; a newer submission must not be
        // undercut by stale output.
        if submission.is_superseded() {
            return false;
        }

        {
            let mut presented = self.presented.lock();
            presented.items = Arc::clone(snapshot.items());
            presented.before = snapshot.placeholders_before();
            presented.after = snapshot.placeholders_after();
        }
        // Publish the count before any observer callback runs.
        self.item_count.store(new_total, Ordering::SeqCst);

        if !events.is_empty() {
            let mut callback = self.update_callback.lock();
            for event in events {
                callback.on_event(event);
            }
        }
        self.aggregator
            .dispatch(CombinedLoadStates::from_source(snapshot.states().clone()));
        true
    }

    /// Diff the loaded item runs, then reconcile placeholder count deltas as
    /// leading/trailing insert/remove events.
    fn placeholder_aware_diff(
        &self,
        old_items: &[T],
        old_before: usize,
        old_after: usize,
        snapshot: &Snapshot<T>,
    ) -> Vec<ListUpdateEvent> {
        let mut events = compute_list_diff(
            old_items,
            snapshot.items(),
            self.diff_callback.as_ref(),
            self.detect_moves,
        );
        // Item-space positions shift past the old leading placeholder run.
        if old_before > 0 {
            for event in &mut events {
                match event {
                    ListUpdateEvent::Inserted { position, .. }
                    | ListUpdateEvent::Removed { position, .. }
                    | ListUpdateEvent::Changed { position, .. } => *position += old_before,
                    ListUpdateEvent::Moved { from, to } => {
                        *from += old_before;
                        *to += old_before;
                    }
                }
            }
        }

        let new_len = snapshot.items().len();
        let new_after = snapshot.placeholders_after();
        match new_after.cmp(&old_after) {
            std::cmp::Ordering::Greater => events.push(ListUpdateEvent::Inserted {
                position: old_before + new_len + old_after,
                count: new_after - old_after,
            }),
            std::cmp::Ordering::Less => events.push(ListUpdateEvent::Removed {
                position: old_before + new_len + new_after,
                count: old_after - new_after,
            }),
            std::cmp::Ordering::Equal => {}
        }

        let new_before = snapshot.placeholders_before();
        match new_before.cmp(&old_before) {
            std::cmp::Ordering::Greater => events.push(ListUpdateEvent::Inserted {
                position: 0,
                count: new_before - old_before,
            }),
            std::cmp::Ordering::Less => events.push(ListUpdateEvent::Removed {
                position: 0,
                count: old_before - new_before,
            }),
            std::cmp::Ordering::Equal => {}
        }
        events
    }
}
