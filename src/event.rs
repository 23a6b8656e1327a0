//! Positional list-update events and the callback sink that receives them.

use smallvec::SmallVec;
use std::sync::Arc;

/// Opaque change payload attached to [`ListUpdateEvent::Changed`].
///
/// Payloads are produced by [`DiffCallback::change_payload`] and passed
/// through untouched; consumers downcast or interpret them as they see fit.
///
/// [`DiffCallback::change_payload`]: crate::diff::DiffCallback::change_payload
pub type ChangePayload = Arc<dyn std::any::Any + Send + Sync>;

/// A positional update to the displayed list.
///
/// Positions are valid in the list state produced by all preceding events of
/// the same batch. Zero-count events are legal no-ops and must be tolerated
/// by consumers; the differ never filters them out.
#[derive(Clone)]
pub enum ListUpdateEvent {
    /// `count` items inserted starting at `position`.
    Inserted {
        /// First inserted position.
        position: usize,
        /// Number of inserted items.
        count: usize,
    },
    /// `count` items removed starting at `position`.
    Removed {
        /// First removed position.
        position: usize,
        /// Number of removed items.
        count: usize,
    },
    /// `count` items starting at `position` changed contents in place.
    Changed {
        /// First changed position.
        position: usize,
        /// Number of changed items.
        count: usize,
        /// Optional consumer-defined payload describing the change.
        payload: Option<ChangePayload>,
    },
    /// One item moved from `from` to `to`.
    Moved {
        /// Position before the move.
        from: usize,
        /// Position after the move.
        to: usize,
    },
}

impl std::fmt::Debug for ListUpdateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted { position, count } => f
                .debug_struct("Inserted")
                .field("position", position)
                .field("count", count)
                .finish(),
            Self::Removed { position, count } => f
                .debug_struct("Removed")
                .field("position", position)
                .field("count", count)
                .finish(),
            Self::Changed {
                position,
                count,
                payload,
            } => f
                .debug_struct("Changed")
                .field("position", position)
                .field("count", count)
                .field("payload", &payload.as_ref().map(|_| "..."))
                .finish(),
            Self::Moved { from, to } => f
                .debug_struct("Moved")
                .field("from", from)
                .field("to", to)
                .finish(),
        }
    }
}

impl PartialEq for ListUpdateEvent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Inserted { position, count },
                Self::Inserted {
                    position: p,
                    count: c,
                },
            )
            | (
                Self::Removed { position, count },
                Self::Removed {
                    position: p,
                    count: c,
                },
            ) => position == p && count == c,
            (
                Self::Changed {
                    position,
                    count,
                    payload,
                },
                Self::Changed {
                    position: p,
                    count: c,
                    payload: pl,
                },
            ) => {
                position == p
                    && count == c
                    && match (payload, pl) {
                        (None, None) => true,
                        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                        _ => false,
                    }
            }
            (Self::Moved { from, to }, Self::Moved { from: f2, to: t2 }) => {
                from == f2 && to == t2
            }
            _ => false,
        }
    }
}

/// Four-method sink for positional list updates.
///
/// Implementations receive events in dispatch order; every position is valid
/// in the list state produced by the preceding calls of the same batch.
pub trait ListUpdateCallback: Send {
    /// `count` items inserted at `position`.
    fn on_inserted(&mut self, position: usize, count: usize);
    /// `count` items removed at `position`.
    fn on_removed(&mut self, position: usize, count: usize);
    /// `count` items changed at `position`.
    fn on_changed(&mut self, position: usize, count: usize, payload: Option<ChangePayload>);
    /// One item moved from `from` to `to`.
    fn on_moved(&mut self, from: usize, to: usize);

    /// Dispatch a single event to the matching method.
    fn on_event(&mut self, event: ListUpdateEvent) {
        match event {
            ListUpdateEvent::Inserted { position, count } => self.on_inserted(position, count),
            ListUpdateEvent::Removed { position, count } => self.on_removed(position, count),
            ListUpdateEvent::Changed {
                position,
                count,
                payload,
            } => self.on_changed(position, count, payload),
            ListUpdateEvent::Moved { from, to } => self.on_moved(from, to),
        }
    }
}

/// Event coalescer that merges adjacent compatible events.
///
/// Single-item diff output frequently produces runs like
/// `Inserted(5, 1), Inserted(6, 1)`; batching them into `Inserted(5, 2)`
/// keeps callback traffic proportional to the number of contiguous regions
/// rather than the number of items.
#[derive(Default)]
pub(crate) struct EventCoalescer {
    batched: SmallVec<[ListUpdateEvent; 8]>,
}

impl EventCoalescer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Push an event, merging it into the previous one when contiguous.
    pub(crate) fn push(&mut self, event: ListUpdateEvent) {
        if let Some(last) = self.batched.last_mut() {
            match (last, &event) {
                (
                    ListUpdateEvent::Inserted { position, count },
                    ListUpdateEvent::Inserted {
                        position: p,
                        count: c,
                    },
                ) if *p == *position + *count || *p == *position => {
                    *count += c;
                    return;
                }
                (
                    ListUpdateEvent::Removed { position, count },
                    ListUpdateEvent::Removed {
                        position: p,
                        count: c,
                    },
                ) if *p == *position || *p + *c == *position => {
                    // Removing at the same index (forward run) or the index
                    // just below (backward run) extends the region.
                    *position = (*position).min(*p);
                    *count += c;
                    return;
                }
                (
                    ListUpdateEvent::Changed {
                        position,
                        count,
                        payload: None,
                    },
                    ListUpdateEvent::Changed {
                        position: p,
                        count: c,
                        payload: None,
                    },
                ) if *p == *position + *count || *p + *c == *position => {
                    *position = (*position).min(*p);
                    *count += c;
                    return;
                }
                _ => {}
            }
        }
        self.batched.push(event);
    }

    /// Drain the batched events in dispatch order.
    pub(crate) fn into_events(self) -> SmallVec<[ListUpdateEvent; 8]> {
        self.batched
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_forward_insert_run() {
        let mut c = EventCoalescer::new();
        c.push(ListUpdateEvent::Inserted {
            position: 5,
            count: 1,
        });
        c.push(ListUpdateEvent::Inserted {
            position: 6,
            count: 1,
        });
        let events = c.into_events();
        assert_eq!(
            events.as_slice(),
            &[ListUpdateEvent::Inserted {
                position: 5,
                count: 2
            }]
        );
    }

    #[test]
    fn coalesces_backward_remove_run() {
        let mut c = EventCoalescer::new();
        c.push(ListUpdateEvent::Removed {
            position: 4,
            count: 1,
        });
        c.push(ListUpdateEvent::Removed {
            position: 3,
            count: 1,
        });
        let events = c.into_events();
        assert_eq!(
            events.as_slice(),
            &[ListUpdateEvent::Removed {
                position: 3,
                count: 2
            }]
        );
    }

    #[test]
    fn does_not_merge_disjoint_events() {
        let mut c = EventCoalescer::new();
        c.push(ListUpdateEvent::Inserted {
            position: 0,
            count: 1,
        });
        c.push(ListUpdateEvent::Inserted {
            position: 5,
            count: 1,
        });
        assert_eq!(c.into_events().len(), 2);
    }

    #[test]
    fn moves_break_runs() {
        let mut c = EventCoalescer::new();
        c.push(ListUpdateEvent::Inserted {
            position: 0,
            count: 1,
        });
        c.push(ListUpdateEvent::Moved { from: 2, to: 0 });
        c.push(ListUpdateEvent::Inserted {
            position: 1,
            count: 1,
        });
        assert_eq!(c.into_events().len(), 3);
    }
}
