//! Load-state aggregation and broadcast.
//!
//! One internal broadcaster feeds two thin observation adapters: synchronous
//! listeners and async streams. Both observe identical [`CombinedLoadStates`]
//! values in identical order for a given submission sequence; consecutive
//! duplicates are dropped once, centrally, before either adapter sees them.

use crate::state::CombinedLoadStates;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;

type Listener = Arc<dyn Fn(&CombinedLoadStates) + Send + Sync>;

/// Handle returned by [`LoadStateAggregator::add_listener`], used to detach
/// the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// Tracks load states across directions and broadcasts each distinct
/// aggregate to all registered observers.
pub struct LoadStateAggregator {
    inner: Mutex<Inner>,
}

struct Inner {
    next_listener_id: u64,
    listeners: IndexMap<u64, Listener>,
    streams: Vec<mpsc::UnboundedSender<CombinedLoadStates>>,
    current: Option<CombinedLoadStates>,
}

impl LoadStateAggregator {
    /// New aggregator with no observers and no dispatched state yet.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_listener_id: 0,
                listeners: IndexMap::new(),
                streams: Vec::new(),
                current: None,
            }),
        }
    }

    /// Register a synchronous listener, invoked for every distinct
    /// aggregate in dispatch order. The current value is not replayed.
    pub fn add_listener(
        &self,
        listener: impl Fn(&CombinedLoadStates) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let mut inner = self.inner.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.insert(id, Arc::new(listener));
        ListenerHandle(id)
    }

    /// Detach a listener. Detaching twice is a no-op.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.inner.lock().listeners.shift_remove(&handle.0);
    }

    /// An async stream observing the same values, in the same order, as the
    /// synchronous listeners. The current value is not replayed.
    pub fn state_stream(&self) -> LoadStateStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().streams.push(tx);
        LoadStateStream { rx }
    }

    /// Last dispatched aggregate, if any.
    pub fn current(&self) -> Option<CombinedLoadStates> {
        self.inner.lock().current.clone()
    }

    /// Broadcast a new aggregate. Consecutive duplicates are dropped.
    ///
    /// Listeners run on the dispatching task, outside the registry lock, so
    /// a listener may register or detach observers without deadlocking.
    pub fn dispatch(&self, combined: CombinedLoadStates) {
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.lock();
            if inner.current.as_ref() == Some(&combined) {
                return;
            }
            inner.current = Some(combined.clone());
            inner
                .streams
                .retain(|tx| tx.send(combined.clone()).is_ok());
            inner.listeners.values().cloned().collect()
        };
        tracing::trace!(?combined, "load states dispatched");
        for listener in listeners {
            listener(&combined);
        }
    }
}

impl Default for LoadStateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoadStateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LoadStateAggregator")
            .field("listeners", &inner.listeners.len())
            .field("streams", &inner.streams.len())
            .field("current", &inner.current)
            .finish()
    }
}

/// Async adapter over the aggregator's broadcast.
#[derive(Debug)]
pub struct LoadStateStream {
    rx: mpsc::UnboundedReceiver<CombinedLoadStates>,
}

impl LoadStateStream {
    /// Receive the next aggregate; `None` once the aggregator is dropped.
    pub async fn recv(&mut self) -> Option<CombinedLoadStates> {
        self.rx.recv().await
    }
}

impl Stream for LoadStateStream {
    type Item = CombinedLoadStates;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::{LoadState, LoadStates, LoadType};

    fn with_refresh(state: LoadState) -> CombinedLoadStates {
        let mut states = LoadStates::idle();
        states.set(LoadType::Refresh, state);
        CombinedLoadStates::from_source(states)
    }

    #[test]
    fn listeners_and_streams_observe_identical_sequences() {
        let aggregator = LoadStateAggregator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        aggregator.add_listener(move |s| seen2.lock().push(s.clone()));
        let mut stream = aggregator.state_stream();

        aggregator.dispatch(with_refresh(LoadState::Loading));
        aggregator.dispatch(with_refresh(LoadState::Loading)); // duplicate
        aggregator.dispatch(with_refresh(LoadState::not_loading()));

        let listener_seen = seen.lock().clone();
        assert_eq!(
            listener_seen,
            vec![
                with_refresh(LoadState::Loading),
                with_refresh(LoadState::not_loading()),
            ]
        );

        let mut stream_seen = Vec::new();
        while let Ok(s) = stream.rx.try_recv() {
            stream_seen.push(s);
        }
        assert_eq!(stream_seen, listener_seen);
    }

    #[test]
    fn removed_listener_stops_observing() {
        let aggregator = LoadStateAggregator::new();
        let seen = Arc::new(Mutex::new(0u32));
        let seen2 = Arc::clone(&seen);
        let handle = aggregator.add_listener(move |_| *seen2.lock() += 1);

        aggregator.dispatch(with_refresh(LoadState::Loading));
        aggregator.remove_listener(handle);
        aggregator.dispatch(with_refresh(LoadState::not_loading()));

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn no_replay_on_registration() {
        let aggregator = LoadStateAggregator::new();
        aggregator.dispatch(with_refresh(LoadState::Loading));

        let seen = Arc::new(Mutex::new(0u32));
        let seen2 = Arc::clone(&seen);
        aggregator.add_listener(move |_| *seen2.lock() += 1);
        assert_eq!(*seen.lock(), 0);
        assert_eq!(
            aggregator.current(),
            Some(with_refresh(LoadState::Loading))
        );
    }

    #[test]
    fn listener_may_detach_itself_without_deadlock() {
        let aggregator = Arc::new(LoadStateAggregator::new());
        let agg2 = Arc::clone(&aggregator);
        let handle_slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));
        let slot2 = Arc::clone(&handle_slot);
        let handle = aggregator.add_listener(move |_| {
            if let Some(h) = slot2.lock().take() {
                agg2.remove_listener(h);
            }
        });
        *handle_slot.lock() = Some(handle);
        aggregator.dispatch(with_refresh(LoadState::Loading));
        aggregator.dispatch(with_refresh(LoadState::not_loading()));
    }
}
