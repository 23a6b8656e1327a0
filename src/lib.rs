//! pageflow: an async incremental list differ for paged data.
//!
//! The crate centers on [`PagingDiffer`], which consumes per-submission
//! [`SnapshotStream`]s of immutable list snapshots, computes minimal
//! positional updates against the currently displayed list, and broadcasts
//! aggregated load states to synchronous listeners and async streams alike.
//!
//! Submissions are single-flight in call order: calling
//! [`PagingDiffer::submit_data`] supersedes any in-flight submission the
//! moment it is called, before the returned future is polled. A superseded
//! future just completes; the caller's collection loop keeps running, which
//! is what makes invalidation-driven reconnects cheap.
//!
//! The [`pager`] module supplies a reference upstream: a [`Pager`] turns a
//! [`PagingSource`] into one snapshot stream per source generation, driving
//! prefetch from the differ's access hints and starting a fresh generation
//! whenever the source is invalidated.
//!
//! ```no_run
//! use pageflow::prelude::*;
//! # struct MySource;
//! # #[async_trait::async_trait]
//! # impl PagingSource for MySource {
//! #     type Item = i64;
//! #     async fn load(&self, _p: LoadParams) -> Result<LoadedPage<i64>, PageLoadError> {
//! #         unimplemented!()
//! #     }
//! #     fn invalidation(&self) -> &Invalidation { unimplemented!() }
//! # }
//! # struct NoopCallback;
//! # impl ListUpdateCallback for NoopCallback {
//! #     fn on_inserted(&mut self, _: usize, _: usize) {}
//! #     fn on_removed(&mut self, _: usize, _: usize) {}
//! #     fn on_changed(&mut self, _: usize, _: usize, _: Option<ChangePayload>) {}
//! #     fn on_moved(&mut self, _: usize, _: usize) {}
//! # }
//! # async fn demo() {
//! let differ = PagingDiffer::new(EqDiffCallback, NoopCallback);
//! let pager = Pager::new(PagingConfig::new(20), 0, || MySource);
//! let mut feed = pager.feed();
//! while let Some(stream) = feed.recv().await {
//!     differ.submit_data(stream).await;
//! }
//! # }
//! ```

pub mod aggregator;
pub mod diff;
pub mod differ;
pub mod event;
pub mod pager;
mod sequencer;
pub mod snapshot;
pub mod state;
pub mod wire;

pub use aggregator::{ListenerHandle, LoadStateAggregator, LoadStateStream};
pub use diff::{compute_list_diff, DiffCallback, EqDiffCallback};
pub use differ::{PagingDiffer, PagingDifferBuilder};
pub use event::{ChangePayload, ListUpdateCallback, ListUpdateEvent};
pub use pager::{
    Invalidation, LoadParams, LoadedPage, PageLoadError, Pager, PagerFeed, PagingConfig,
    PagingSource,
};
pub use snapshot::{LoadHint, Snapshot, SnapshotSender, SnapshotStream};
pub use state::{CombinedLoadStates, LoadState, LoadStates, LoadType};
pub use wire::{ComparisonType, ComparisonTypeProto};

/// Convenience re-exports for the common surface.
pub mod prelude {
    pub use crate::aggregator::{ListenerHandle, LoadStateStream};
    pub use crate::diff::{DiffCallback, EqDiffCallback};
    pub use crate::differ::PagingDiffer;
    pub use crate::event::{ChangePayload, ListUpdateCallback, ListUpdateEvent};
    pub use crate::pager::{
        Invalidation, LoadParams, LoadedPage, PageLoadError, Pager, PagerFeed, PagingConfig,
        PagingSource,
    };
    pub use crate::snapshot::{LoadHint, Snapshot, SnapshotStream};
    pub use crate::state::{CombinedLoadStates, LoadState, LoadStates, LoadType};
}
