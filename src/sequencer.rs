//! Single-flight sequencing of snapshot submissions.
//!
//! Every call to `submit_data` claims a generation number eagerly, before
//! the returned future is first polled, so "later in call order wins" holds
//! regardless of how the futures are scheduled. The active generation is
//! published through a watch channel that doubles as the cancellation token
//! for superseded submissions.

use tokio::sync::watch;

/// Issues call-ordered generations and tracks which one is active.
#[derive(Debug)]
pub(crate) struct SubmissionSequencer {
    active: watch::Sender<u64>,
}

impl SubmissionSequencer {
    pub(crate) fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self { active }
    }

    /// Claim the next generation and make it the active one, superseding
    /// any in-flight submission.
    pub(crate) fn begin(&self) -> Submission {
        let mut generation = 0;
        self.active.send_modify(|active| {
            *active += 1;
            generation = *active;
        });
        tracing::trace!(generation, "submission started");
        Submission {
            generation,
            active: self.active.subscribe(),
        }
    }

    /// Generation currently authorized to present.
    pub(crate) fn active_generation(&self) -> u64 {
        *self.active.borrow()
    }
}

/// Cancellation token for one submission.
///
/// Checked at safe points: superseded submissions stop before applying or
/// emitting anything further, but the check never cancels the surrounding
/// collection loop — the future just completes.
#[derive(Debug)]
pub(crate) struct Submission {
    generation: u64,
    active: watch::Receiver<u64>,
}

impl Submission {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a later submission has taken over.
    pub(crate) fn is_superseded(&self) -> bool {
        *self.active.borrow() != self.generation
    }

    /// Wait until a later submission takes over.
    pub(crate) async fn superseded(&mut self) {
        while *self.active.borrow_and_update() == self.generation {
            if self.active.changed().await.is_err() {
                return;
            }
        }
    }
}
