//! Minimal paging upstream: sources, config, and the generation driver
//! that turns loads into snapshot streams.
//!
//! The differ treats the upstream as a black box yielding snapshots; this
//! module is the reference producer. A [`Pager`] emits one
//! [`SnapshotStream`] per generation and reacts to the differ's hints:
//! access hints trigger prepend/append loads within `prefetch_distance`,
//! `Refresh` invalidates the current source, `Retry` re-runs failed loads.
//! Invalidating a source ends its generation's stream; the pager then
//! builds a fresh source and emits a new stream on the same feed.

use crate::snapshot::{LoadHint, Snapshot, SnapshotSender, SnapshotStream};
use crate::state::{LoadState, LoadStates, LoadType};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Failure produced by a paging source load.
#[derive(Debug, thiserror::Error)]
pub enum PageLoadError {
    /// The source was invalidated while the load was in flight.
    #[error("paging source was invalidated")]
    Invalidated,
    /// The source itself failed.
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// Paging behavior knobs, builder style.
#[derive(Debug, Clone)]
pub struct PagingConfig {
    /// Items loaded per prepend/append page.
    pub page_size: usize,
    /// How close to a loaded edge an access must be to trigger a load.
    pub prefetch_distance: usize,
    /// Whether unloaded positions count as placeholders.
    pub enable_placeholders: bool,
    /// Items loaded by the initial refresh.
    pub initial_load_size: usize,
}

impl PagingConfig {
    /// Config with the given page size, prefetch distance equal to the page
    /// size, placeholders enabled, and a triple-sized initial load.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            prefetch_distance: page_size,
            enable_placeholders: true,
            initial_load_size: page_size * 3,
        }
    }

    /// Set the prefetch distance.
    pub fn prefetch_distance(mut self, distance: usize) -> Self {
        self.prefetch_distance = distance;
        self
    }

    /// Enable or disable placeholders.
    pub fn enable_placeholders(mut self, enable: bool) -> Self {
        self.enable_placeholders = enable;
        self
    }

    /// Set the initial refresh load size.
    pub fn initial_load_size(mut self, size: usize) -> Self {
        self.initial_load_size = size;
        self
    }
}

/// Invalidation handle shared between a source and its generation driver.
///
/// Invalidation is one-way and sticky: once tripped, the generation ends
/// and the pager starts over with a fresh source.
#[derive(Clone, Debug, Default)]
pub struct Invalidation {
    inner: Arc<InvalidationInner>,
}

#[derive(Debug, Default)]
struct InvalidationInner {
    invalid: AtomicBool,
    notify: Notify,
}

impl Invalidation {
    /// New, valid handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the handle. Idempotent.
    pub fn invalidate(&self) {
        if !self.inner.invalid.swap(true, Ordering::SeqCst) {
            tracing::debug!("paging source invalidated");
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the handle has been tripped.
    pub fn is_invalid(&self) -> bool {
        self.inner.invalid.load(Ordering::SeqCst)
    }

    /// Wait until the handle is tripped. Returns immediately if it already
    /// was.
    pub async fn invalidated(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_invalid() {
                return;
            }
            notified.await;
        }
    }
}

/// Parameters of a single load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadParams {
    /// Direction of the load.
    pub load_type: LoadType,
    /// Key for the page to load. For `Append` this is the key of the first
    /// item after the loaded window; for `Prepend` the key of the last item
    /// before it.
    pub key: i64,
    /// Requested number of items.
    pub load_size: usize,
}

/// One successfully loaded page.
#[derive(Debug, Clone)]
pub struct LoadedPage<T> {
    /// Loaded items in list order.
    pub items: Vec<T>,
    /// Key to prepend from, `None` when the start of data is reached.
    pub prev_key: Option<i64>,
    /// Key to append from, `None` when the end of data is reached.
    pub next_key: Option<i64>,
    /// Count of items before this page, when the source can tell.
    pub items_before: Option<usize>,
    /// Count of items after this page, when the source can tell.
    pub items_after: Option<usize>,
}

/// A source of pages keyed by `i64`.
#[async_trait]
pub trait PagingSource: Send + Sync + 'static {
    /// Item type produced by this source.
    type Item: Clone + Send + Sync + 'static;

    /// Load one page.
    async fn load(&self, params: LoadParams) -> Result<LoadedPage<Self::Item>, PageLoadError>;

    /// This source's invalidation handle.
    fn invalidation(&self) -> &Invalidation;
}

/// Produces one snapshot stream per source generation.
pub struct Pager<S: PagingSource> {
    config: PagingConfig,
    initial_key: i64,
    source_factory: Arc<dyn Fn() -> S + Send + Sync>,
}

impl<S: PagingSource> Pager<S> {
    /// Build a pager from a config, an initial refresh key, and a factory
    /// invoked once per generation.
    pub fn new(
        config: PagingConfig,
        initial_key: i64,
        source_factory: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            initial_key,
            source_factory: Arc::new(source_factory),
        }
    }

    /// Start producing generations.
    ///
    /// Must be called within a tokio runtime; the driver runs as a spawned
    /// task until the feed receiver is dropped and the current generation
    /// is invalidated.
    pub fn feed(&self) -> PagerFeed<S::Item> {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let initial_key = self.initial_key;
        let factory = Arc::clone(&self.source_factory);
        tokio::spawn(async move {
            loop {
                let source = factory();
                let (sender, stream) = SnapshotStream::channel();
                if tx.send(stream).is_err() {
                    // Feed consumer is gone; stop producing generations.
                    break;
                }
                let generation = Generation::new(config.clone(), &source, sender);
                generation.run(initial_key).await;
            }
        });
        PagerFeed { rx }
    }
}

impl<S: PagingSource> std::fmt::Debug for Pager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("config", &self.config)
            .field("initial_key", &self.initial_key)
            .finish_non_exhaustive()
    }
}

/// Receiver of per-generation snapshot streams.
#[derive(Debug)]
pub struct PagerFeed<T> {
    rx: mpsc::UnboundedReceiver<SnapshotStream<T>>,
}

impl<T> PagerFeed<T> {
    /// Receive the next generation's stream.
    pub async fn recv(&mut self) -> Option<SnapshotStream<T>> {
        self.rx.recv().await
    }
}

/// Driver for one source generation.
struct Generation<'a, S: PagingSource> {
    config: PagingConfig,
    source: &'a S,
    sender: SnapshotSender<S::Item>,
    items: Arc<Vec<S::Item>>,
    before: usize,
    after: usize,
    prev_key: Option<i64>,
    next_key: Option<i64>,
    states: LoadStates,
    failed: [Option<LoadParams>; 3],
}

impl<'a, S: PagingSource> Generation<'a, S> {
    fn new(config: PagingConfig, source: &'a S, sender: SnapshotSender<S::Item>) -> Self {
        Self {
            config,
            source,
            sender,
            items: Arc::new(Vec::new()),
            before: 0,
            after: 0,
            prev_key: None,
            next_key: None,
            states: LoadStates::idle(),
            failed: [None, None, None],
        }
    }

    async fn run(mut self, initial_key: i64) {
        self.load(LoadParams {
            load_type: LoadType::Refresh,
            key: initial_key,
            load_size: self.config.initial_load_size,
        })
        .await;

        loop {
            if self.source.invalidation().is_invalid() {
                return;
            }
            tokio::select! {
                hint = self.sender.recv_hint() => match hint {
                    Some(LoadHint::Access { index }) => self.on_access(index).await,
                    Some(LoadHint::Refresh) => self.source.invalidation().invalidate(),
                    Some(LoadHint::Retry) => self.retry().await,
                    None => {
                        // Consumer fully detached; hold the generation open
                        // until the source itself is invalidated.
                        self.source.invalidation().invalidated().await;
                        return;
                    }
                },
                () = self.source.invalidation().invalidated() => return,
            }
        }
    }

    /// React to a displayed-position access with prefetch loads.
    async fn on_access(&mut self, index: usize) {
        if self.items.is_empty() {
            return;
        }
        let first = self.before;
        let last = self.before + self.items.len() - 1;

        if index + self.config.prefetch_distance > last
            && self.next_key.is_some()
            && self.can_start(LoadType::Append)
        {
            if let Some(key) = self.next_key {
                self.load(LoadParams {
                    load_type: LoadType::Append,
                    key,
                    load_size: self.config.page_size,
                })
                .await;
            }
        }

        if index < first + self.config.prefetch_distance
            && self.prev_key.is_some()
            && self.can_start(LoadType::Prepend)
        {
            if let Some(key) = self.prev_key {
                self.load(LoadParams {
                    load_type: LoadType::Prepend,
                    key,
                    load_size: self.config.page_size,
                })
                .await;
            }
        }
    }

    /// Re-run failed loads, re-entering `Loading` in their directions.
    async fn retry(&mut self) {
        for slot in 0..self.failed.len() {
            if let Some(params) = self.failed[slot].take() {
                self.load(params).await;
            }
        }
    }

    /// Whether a new load may start in this direction: not already loading,
    /// pagination not exhausted, and not parked on an error awaiting retry.
    fn can_start(&self, load_type: LoadType) -> bool {
        matches!(
            self.states.get(load_type),
            LoadState::NotLoading {
                end_of_pagination_reached: false
            }
        )
    }

    async fn load(&mut self, params: LoadParams) {
        let load_type = params.load_type;
        tracing::debug!(?load_type, key = params.key, size = params.load_size, "page load");
        debug_assert!(
            self.states
                .get(load_type)
                .can_transition_to(&LoadState::Loading),
            "load started while already loading in {load_type:?}"
        );
        self.states.set(load_type, LoadState::Loading);
        self.emit();

        let result = self.source.load(params).await;
        if self.source.invalidation().is_invalid() {
            return;
        }
        match result {
            Ok(page) => {
                self.apply(load_type, page);
                self.emit();
            }
            Err(err) => {
                tracing::debug!(?load_type, %err, "page load failed");
                self.failed[direction_slot(load_type)] = Some(params);
                self.states
                    .set(load_type, LoadState::Error(Arc::new(err.into())));
                self.emit();
            }
        }
    }

    fn apply(&mut self, load_type: LoadType, page: LoadedPage<S::Item>) {
        let placeholders = self.config.enable_placeholders;
        match load_type {
            LoadType::Refresh => {
                let empty = page.items.is_empty();
                self.before = placeholders
                    .then_some(page.items_before)
                    .flatten()
                    .unwrap_or(0);
                self.after = placeholders
                    .then_some(page.items_after)
                    .flatten()
                    .unwrap_or(0);
                self.prev_key = page.prev_key;
                self.next_key = page.next_key;
                self.items = Arc::new(page.items);
                self.states = LoadStates {
                    refresh: LoadState::NotLoading {
                        end_of_pagination_reached: empty
                            && self.prev_key.is_none()
                            && self.next_key.is_none(),
                    },
                    prepend: LoadState::NotLoading {
                        end_of_pagination_reached: self.prev_key.is_none(),
                    },
                    append: LoadState::NotLoading {
                        end_of_pagination_reached: self.next_key.is_none(),
                    },
                };
            }
            LoadType::Append => {
                self.next_key = page.next_key;
                self.after = if placeholders {
                    page.items_after
                        .unwrap_or_else(|| self.after.saturating_sub(page.items.len()))
                } else {
                    0
                };
                Arc::make_mut(&mut self.items).extend(page.items);
                self.states.set(
                    LoadType::Append,
                    LoadState::NotLoading {
                        end_of_pagination_reached: self.next_key.is_none(),
                    },
                );
            }
            LoadType::Prepend => {
                self.prev_key = page.prev_key;
                self.before = if placeholders {
                    page.items_before
                        .unwrap_or_else(|| self.before.saturating_sub(page.items.len()))
                } else {
                    0
                };
                let loaded = page.items;
                let count = loaded.len();
                Arc::make_mut(&mut self.items).splice(0..0, loaded);
                debug_assert!(count <= self.items.len());
                self.states.set(
                    LoadType::Prepend,
                    LoadState::NotLoading {
                        end_of_pagination_reached: self.prev_key.is_none(),
                    },
                );
            }
        }
    }

    /// Emit the current window as a snapshot; failures mean nobody is
    /// watching, which is fine.
    fn emit(&self) {
        let _ = self.sender.send(Snapshot::new(
            Arc::clone(&self.items),
            self.before,
            self.after,
            self.states.clone(),
        ));
    }
}

const fn direction_slot(load_type: LoadType) -> usize {
    match load_type {
        LoadType::Refresh => 0,
        LoadType::Prepend => 1,
        LoadType::Append => 2,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalidation_is_sticky_and_wakes_waiters() {
        let invalidation = Invalidation::new();
        let waiter = invalidation.clone();
        let task = tokio::spawn(async move { waiter.invalidated().await });
        tokio::task::yield_now().await;
        invalidation.invalidate();
        invalidation.invalidate();
        task.await.unwrap();
        assert!(invalidation.is_invalid());
        // Immediate return once tripped.
        invalidation.invalidated().await;
    }

    #[test]
    fn config_defaults_follow_page_size() {
        let config = PagingConfig::new(10);
        assert_eq!(config.prefetch_distance, 10);
        assert_eq!(config.initial_load_size, 30);
        assert!(config.enable_placeholders);
    }
}
