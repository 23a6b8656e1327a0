//! Shared fixtures: a deterministic paging source over `0..total` and an
//! update-callback capture.

#![allow(dead_code)]

use pageflow::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Paging source over the items `0..total`, where each item's value is its
/// index. Supports one-shot failure injection and external invalidation.
pub struct TestSource {
    total: i64,
    invalidation: Invalidation,
    fail_next: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl PagingSource for TestSource {
    type Item = i64;

    async fn load(&self, params: LoadParams) -> Result<LoadedPage<i64>, PageLoadError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PageLoadError::Source(anyhow::anyhow!("injected failure")));
        }
        if self.invalidation.is_invalid() {
            return Err(PageLoadError::Invalidated);
        }
        let total = self.total;
        let size = params.load_size as i64;
        let (start, end) = match params.load_type {
            LoadType::Refresh => {
                let start = params.key.clamp(0, total);
                (start, (start + size).min(total))
            }
            LoadType::Append => {
                let start = params.key.clamp(0, total);
                (start, (start + size).min(total))
            }
            LoadType::Prepend => {
                let end = (params.key + 1).clamp(0, total);
                ((end - size).max(0), end)
            }
        };
        Ok(LoadedPage {
            items: (start..end).collect(),
            prev_key: (start > 0).then_some(start - 1),
            next_key: (end < total).then_some(end),
            items_before: Some(start as usize),
            items_after: Some((total - end) as usize),
        })
    }

    fn invalidation(&self) -> &Invalidation {
        &self.invalidation
    }
}

/// Builds one [`TestSource`] per pager generation, keeping handles to the
/// most recent source's invalidation and to the shared failure flag.
pub struct TestSourceFactory {
    total: i64,
    current: Arc<Mutex<Option<Invalidation>>>,
    fail_next: Arc<AtomicBool>,
}

impl TestSourceFactory {
    pub fn new(total: i64) -> Self {
        Self {
            total,
            current: Arc::new(Mutex::new(None)),
            fail_next: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Factory closure to hand to [`Pager::new`].
    pub fn factory(&self) -> impl Fn() -> TestSource + Send + Sync + 'static {
        let total = self.total;
        let current = Arc::clone(&self.current);
        let fail_next = Arc::clone(&self.fail_next);
        move || {
            let source = TestSource {
                total,
                invalidation: Invalidation::new(),
                fail_next: Arc::clone(&fail_next),
            };
            *current.lock() = Some(source.invalidation.clone());
            source
        }
    }

    /// Invalidate the most recently built source.
    pub fn invalidate_current(&self) {
        if let Some(invalidation) = self.current.lock().as_ref() {
            invalidation.invalidate();
        }
    }

    /// Make the next load fail once.
    pub fn fail_next_load(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

/// Update callback recording every dispatched event.
#[derive(Clone, Default)]
pub struct Capture {
    events: Arc<Mutex<Vec<ListUpdateEvent>>>,
}

impl Capture {
    pub fn take(&self) -> Vec<ListUpdateEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn snapshot(&self) -> Vec<ListUpdateEvent> {
        self.events.lock().clone()
    }
}

impl ListUpdateCallback for Capture {
    fn on_inserted(&mut self, position: usize, count: usize) {
        self.events
            .lock()
            .push(ListUpdateEvent::Inserted { position, count });
    }

    fn on_removed(&mut self, position: usize, count: usize) {
        self.events
            .lock()
            .push(ListUpdateEvent::Removed { position, count });
    }

    fn on_changed(&mut self, position: usize, count: usize, payload: Option<ChangePayload>) {
        self.events.lock().push(ListUpdateEvent::Changed {
            position,
            count,
            payload,
        });
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        self.events.lock().push(ListUpdateEvent::Moved { from, to });
    }
}

/// Await load-state aggregates until one full non-idle -> idle cycle has
/// been observed, returning everything seen.
pub async fn wait_for_cycle(stream: &mut LoadStateStream) -> Vec<CombinedLoadStates> {
    let mut seen = Vec::new();
    let mut was_busy = false;
    while let Some(states) = stream.recv().await {
        let idle = states.is_idle();
        seen.push(states);
        if was_busy && idle {
            break;
        }
        was_busy = was_busy || !idle;
    }
    seen
}

/// Await aggregates until one carries an error in any direction.
pub async fn wait_for_error(stream: &mut LoadStateStream) -> CombinedLoadStates {
    loop {
        match stream.recv().await {
            Some(states) if states.error().is_some() => return states,
            Some(_) => {}
            None => panic!("state stream ended before an error was observed"),
        }
    }
}
