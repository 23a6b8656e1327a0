//! Diff algorithm for computing minimal list updates.
//!
//! Produces a batch of [`ListUpdateEvent`]s that transform the old item run
//! into the new one. Event positions are valid in the list state produced by
//! the preceding events of the batch: removals are dispatched in descending
//! position order, then moves, then insertions in ascending order, then
//! in-place changes with final positions.

use crate::event::{ChangePayload, EventCoalescer, ListUpdateEvent};
use smallvec::SmallVec;

/// Identity/content equality pair driving the diff.
///
/// `are_items_the_same` decides whether two entries represent the same
/// logical item (identity); `are_contents_the_same` decides whether a
/// matched pair needs a `Changed` event (content).
pub trait DiffCallback<T>: Send + Sync {
    /// Whether `old` and `new` represent the same logical item.
    fn are_items_the_same(&self, old: &T, new: &T) -> bool;

    /// Whether a matched pair has identical displayed contents.
    fn are_contents_the_same(&self, old: &T, new: &T) -> bool;

    /// Optional payload attached to the `Changed` event for a matched pair
    /// whose contents differ.
    fn change_payload(&self, _old: &T, _new: &T) -> Option<ChangePayload> {
        None
    }
}

/// [`DiffCallback`] for item types where identity and content are both
/// plain equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct EqDiffCallback;

impl<T: PartialEq + Send + Sync> DiffCallback<T> for EqDiffCallback {
    fn are_items_the_same(&self, old: &T, new: &T) -> bool {
        old == new
    }

    fn are_contents_the_same(&self, old: &T, new: &T) -> bool {
        old == new
    }
}

/// Compute the update events transforming `old` into `new`.
///
/// With `detect_moves`, an unmatched removal and an unmatched insertion of
/// the same logical item become a single `Moved` event instead of a
/// remove/insert pair.
pub fn compute_list_diff<T>(
    old: &[T],
    new: &[T],
    callback: &dyn DiffCallback<T>,
    detect_moves: bool,
) -> Vec<ListUpdateEvent> {
    let diagonals = myers_diagonals(old, new, callback);

    // old_target[i] = final position of old item i, None when removed.
    let mut old_target: Vec<Option<usize>> = vec![None; old.len()];
    let mut new_matched: Vec<bool> = vec![false; new.len()];
    for &(i, j) in &diagonals {
        old_target[i] = Some(j);
        new_matched[j] = true;
    }

    if detect_moves {
        // Pair leftover removals with leftover insertions of the same
        // identity. Greedy first-match keeps the pairing deterministic.
        for i in 0..old.len() {
            if old_target[i].is_some() {
                continue;
            }
            for j in 0..new.len() {
                if !new_matched[j] && callback.are_items_the_same(&old[i], &new[j]) {
                    old_target[i] = Some(j);
                    new_matched[j] = true;
                    break;
                }
            }
        }
    }

    let mut coalescer = EventCoalescer::new();

    // Removals, descending so earlier positions stay valid.
    for i in (0..old.len()).rev() {
        if old_target[i].is_none() {
            coalescer.push(ListUpdateEvent::Removed {
                position: i,
                count: 1,
            });
        }
    }

    // Survivors in old order, tagged with their final positions. Diagonal
    // matches are monotonic; only move-detected pairs can be out of order.
    let mut work: SmallVec<[usize; 16]> = old_target.iter().filter_map(|t| *t).collect();

    // Moves: selection pass pulling each out-of-order survivor backward to
    // its slot. An in-order run (the common case) emits nothing.
    for t in 0..work.len() {
        let min_idx = match work[t..]
            .iter()
            .enumerate()
            .min_by_key(|&(_, target)| *target)
        {
            Some((offset, _)) => t + offset,
            None => break,
        };
        if min_idx != t {
            let target = work.remove(min_idx);
            work.insert(t, target);
            coalescer.push(ListUpdateEvent::Moved {
                from: min_idx,
                to: t,
            });
        }
    }

    // Insertions, ascending: by the time position `j` is inserted, every
    // final position below `j` is already present.
    for (j, matched) in new_matched.iter().enumerate() {
        if !matched {
            coalescer.push(ListUpdateEvent::Inserted {
                position: j,
                count: 1,
            });
        }
    }

    // Content changes last, with final positions.
    for (i, target) in old_target.iter().enumerate() {
        if let Some(j) = *target {
            if !callback.are_contents_the_same(&old[i], &new[j]) {
                coalescer.push(ListUpdateEvent::Changed {
                    position: j,
                    count: 1,
                    payload: callback.change_payload(&old[i], &new[j]),
                });
            }
        }
    }

    coalescer.into_events().into_vec()
}

/// Matched (old, new) index pairs along a shortest edit path, ascending on
/// both sides. Classic greedy Myers O(ND) with a stored trace.
fn myers_diagonals<T>(
    old: &[T],
    new: &[T],
    callback: &dyn DiffCallback<T>,
) -> Vec<(usize, usize)> {
    let n = old.len();
    let m = new.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let max = n + m;
    let offset = max as isize;
    // v[offset + k] = furthest x reached on diagonal k.
    let mut v = vec![0usize; 2 * max + 1];
    let mut trace: Vec<Vec<usize>> = Vec::new();

    let mut final_d = 0;
    'outer: for d in 0..=max {
        trace.push(v.clone());
        let d_i = d as isize;
        let mut k = -d_i;
        while k <= d_i {
            let ku = (offset + k) as usize;
            // Short-circuit keeps the k == ±d boundary indices in bounds.
            let mut x = if k == -d_i || (k != d_i && v[ku - 1] < v[ku + 1]) {
                v[ku + 1]
            } else {
                v[ku - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            while x < n && y < m && callback.are_items_the_same(&old[x], &new[y]) {
                x += 1;
                y += 1;
            }
            v[ku] = x;
            if x >= n && y >= m {
                final_d = d;
                break 'outer;
            }
            k += 2;
        }
    }

    // Backtrack from (n, m), collecting the matched runs.
    let mut pairs = Vec::new();
    let mut x = n;
    let mut y = m;
    for d in (1..=final_d).rev() {
        let v = &trace[d];
        let d_i = d as isize;
        let k = x as isize - y as isize;
        let ku = (offset + k) as usize;
        let prev_k = if k == -d_i || (k != d_i && v[ku - 1] < v[ku + 1]) {
            k + 1
        } else {
            k - 1
        };
        let pku = (offset + prev_k) as usize;
        let prev_x = v[pku];
        let prev_y = (prev_x as isize - prev_k) as usize;

        // The edit step lands on (mid_x, mid_y); the snake follows it.
        let (mid_x, mid_y) = if prev_k == k + 1 {
            (prev_x, prev_y + 1)
        } else {
            (prev_x + 1, prev_y)
        };
        while x > mid_x && y > mid_y {
            x -= 1;
            y -= 1;
            pairs.push((x, y));
        }
        x = prev_x;
        y = prev_y;
    }
    // Leading snake at depth 0.
    while x > 0 && y > 0 {
        x -= 1;
        y -= 1;
        pairs.push((x, y));
    }

    pairs.reverse();
    pairs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Replay events over `old` and verify they reproduce `new`.
    fn replay(old: &[i32], events: &[ListUpdateEvent], new: &[i32]) {
        let mut list: Vec<Option<i32>> = old.iter().copied().map(Some).collect();
        for event in events {
            match *event {
                ListUpdateEvent::Inserted { position, count } => {
                    for _ in 0..count {
                        list.insert(position, None);
                    }
                }
                ListUpdateEvent::Removed { position, count } => {
                    for _ in 0..count {
                        list.remove(position);
                    }
                }
                ListUpdateEvent::Changed {
                    position, count, ..
                } => {
                    for slot in list.iter_mut().skip(position).take(count) {
                        *slot = None;
                    }
                }
                ListUpdateEvent::Moved { from, to } => {
                    let item = list.remove(from);
                    list.insert(to, item);
                }
            }
        }
        assert_eq!(list.len(), new.len());
        for (slot, expected) in list.iter().zip(new) {
            if let Some(value) = slot {
                assert_eq!(value, expected);
            }
        }
    }

    fn diff(old: &[i32], new: &[i32]) -> Vec<ListUpdateEvent> {
        let events = compute_list_diff(old, new, &EqDiffCallback, false);
        replay(old, &events, new);
        events
    }

    #[test]
    fn equal_lists_produce_no_events() {
        assert!(diff(&[1, 2, 3], &[1, 2, 3]).is_empty());
    }

    #[test]
    fn append_is_single_insert() {
        let events = diff(&[1, 2], &[1, 2, 3, 4]);
        assert_eq!(
            events,
            vec![ListUpdateEvent::Inserted {
                position: 2,
                count: 2
            }]
        );
    }

    #[test]
    fn prepend_is_single_insert() {
        let events = diff(&[3, 4], &[1, 2, 3, 4]);
        assert_eq!(
            events,
            vec![ListUpdateEvent::Inserted {
                position: 0,
                count: 2
            }]
        );
    }

    #[test]
    fn removal_run_coalesces() {
        let events = diff(&[1, 2, 3, 4, 5], &[1, 5]);
        assert_eq!(
            events,
            vec![ListUpdateEvent::Removed {
                position: 1,
                count: 3
            }]
        );
    }

    #[test]
    fn replace_in_middle() {
        let events = diff(&[1, 2, 3], &[1, 9, 3]);
        assert!(events
            .iter()
            .any(|e| matches!(e, ListUpdateEvent::Removed { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ListUpdateEvent::Inserted { .. })));
    }

    #[test]
    fn disjoint_lists_full_swap() {
        let events = diff(&[1, 2], &[3, 4, 5]);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn overlapping_window_shift() {
        // Sliding a loaded window by one in each direction.
        diff(&[50, 51, 52], &[51, 52, 53]);
        diff(&[51, 52, 53], &[50, 51, 52]);
    }

    #[test]
    fn move_detection_emits_single_move() {
        let old = [1, 2, 3];
        let new = [3, 1, 2];
        let events = compute_list_diff(&old, &new, &EqDiffCallback, true);
        assert_eq!(events, vec![ListUpdateEvent::Moved { from: 2, to: 0 }]);
    }

    #[test]
    fn without_move_detection_uses_remove_insert() {
        let old = [1, 2, 3];
        let new = [3, 1, 2];
        let events = compute_list_diff(&old, &new, &EqDiffCallback, false);
        replay(&old, &events, &new);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ListUpdateEvent::Moved { .. })));
    }

    #[test]
    fn changed_events_use_final_positions() {
        struct ById;
        impl DiffCallback<(i32, i32)> for ById {
            fn are_items_the_same(&self, old: &(i32, i32), new: &(i32, i32)) -> bool {
                old.0 == new.0
            }
            fn are_contents_the_same(&self, old: &(i32, i32), new: &(i32, i32)) -> bool {
                old.1 == new.1
            }
        }
        let old = [(1, 0), (2, 0)];
        let new = [(0, 0), (1, 0), (2, 7)];
        let events = compute_list_diff(&old, &new, &ById, false);
        assert_eq!(
            events,
            vec![
                ListUpdateEvent::Inserted {
                    position: 0,
                    count: 1
                },
                ListUpdateEvent::Changed {
                    position: 2,
                    count: 1,
                    payload: None
                },
            ]
        );
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(
            diff(&[], &[1, 2]),
            vec![ListUpdateEvent::Inserted {
                position: 0,
                count: 2
            }]
        );
        assert_eq!(
            diff(&[1, 2], &[]),
            vec![ListUpdateEvent::Removed {
                position: 0,
                count: 2
            }]
        );
        assert!(diff(&[], &[]).is_empty());
    }
}
