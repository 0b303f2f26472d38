//! Edit-script planning over keyed sequences.
//!
//! [`plan`] turns an old and a new ordered sequence into the smallest edit
//! script this family of heuristics produces: items present in both
//! sequences either stay put (`Leave`) or relocate (`Move`), vanished items
//! can be recycled in place of insertions (`MoveModify`), and the remainder
//! becomes `Insert`/`Delete`. The script covers every old index and every
//! new index exactly once, which is what lets the controller apply it
//! without bookkeeping of its own.

use std::collections::VecDeque;
use std::hash::Hash;

use crate::collections::map::HashMap;

/// One step of an edit script.
///
/// `from` is an old index, `to` a new index. `insert_before` names the old
/// index whose instance the operation lands in front of; any value at or
/// past the old length means "end of list".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Item present in both sequences, already in a stable position. Patch
    /// values in place; no structural change.
    Leave { from: usize, to: usize },
    /// Item present in both sequences but requiring relocation.
    Move {
        from: usize,
        to: usize,
        insert_before: usize,
    },
    /// An old instance is recycled for a different item: relocate, then
    /// patch the new values in.
    MoveModify {
        from: usize,
        to: usize,
        insert_before: usize,
    },
    /// A brand-new item with no instance to recycle.
    Insert { to: usize, insert_before: usize },
    /// An old instance with no counterpart; torn down.
    Delete { from: usize },
}

impl EditOp {
    /// The old index this operation consumes, if any.
    pub fn from_index(&self) -> Option<usize> {
        match *self {
            EditOp::Leave { from, .. }
            | EditOp::Move { from, .. }
            | EditOp::MoveModify { from, .. }
            | EditOp::Delete { from } => Some(from),
            EditOp::Insert { .. } => None,
        }
    }

    /// The new index this operation produces, if any.
    pub fn to_index(&self) -> Option<usize> {
        match *self {
            EditOp::Leave { to, .. }
            | EditOp::Move { to, .. }
            | EditOp::MoveModify { to, .. }
            | EditOp::Insert { to, .. } => Some(to),
            EditOp::Delete { .. } => None,
        }
    }
}

/// Plans an edit script taking `old` to `new`.
///
/// Matching is by value equality with last-occurrence-wins on duplicates;
/// earlier duplicates fall through to Insert/Delete silently. When
/// `will_reuse` is set, unmatched old instances are recycled (FIFO) for new
/// items instead of inserting from scratch.
pub fn plan<T: Eq + Hash>(old: &[T], new: &[T], will_reuse: bool) -> Vec<EditOp> {
    // Bipartite match: value -> last new index, consumed on first (i.e.
    // leftmost old) use so no new slot is claimed twice.
    let mut last_new_index: HashMap<&T, usize> = HashMap::with_capacity(new.len());
    for (index, item) in new.iter().enumerate() {
        last_new_index.insert(item, index);
    }

    // (old index, new index) pairs in old-index order.
    let mut matched: Vec<(usize, usize)> = Vec::new();
    let mut pool: VecDeque<usize> = VecDeque::new();
    for (index, item) in old.iter().enumerate() {
        match last_new_index.remove(item) {
            Some(new_index) => matched.push((index, new_index)),
            None => pool.push_back(index),
        }
    }

    let stable = stable_pairs(&matched);
    let new_to_old: HashMap<usize, usize> = matched
        .iter()
        .map(|&(old_index, new_index)| (new_index, old_index))
        .collect();

    let mut ops = Vec::with_capacity(old.len() + new.len());
    let mut next_stable = 0;
    for to in 0..new.len() {
        // boundary: everything up to the next stable pair inserts in front
        // of that pair's instance; past the last one, at the end
        let (stable_new, boundary) = match stable.get(next_stable) {
            Some(&(old_index, new_index)) => (Some(new_index), old_index),
            None => (None, old.len()),
        };
        if stable_new == Some(to) {
            ops.push(EditOp::Leave { from: boundary, to });
            next_stable += 1;
        } else if let Some(&from) = new_to_old.get(&to) {
            ops.push(EditOp::Move {
                from,
                to,
                insert_before: boundary,
            });
        } else if will_reuse && !pool.is_empty() {
            let from = pool.pop_front().expect("pool checked non-empty");
            ops.push(EditOp::MoveModify {
                from,
                to,
                insert_before: boundary,
            });
        } else {
            ops.push(EditOp::Insert {
                to,
                insert_before: boundary,
            });
        }
    }
    for from in pool {
        ops.push(EditOp::Delete { from });
    }
    ops
}

/// Picks the subset of matched pairs that keep their relative order and
/// therefore need no structural move.
///
/// Two-phase heuristic rather than a true longest increasing subsequence:
/// partition the new indices (already in old-index order) into maximal
/// strictly increasing runs, then greedily concatenate runs whose first
/// value exceeds the running maximum. If no run extends the first one,
/// fall back to the single longest run (first of equal length). Consumers
/// depend on exactly this move selection, so the approximation is load-
/// bearing; do not swap in an optimal LIS.
fn stable_pairs(matched: &[(usize, usize)]) -> Vec<(usize, usize)> {
    if matched.is_empty() {
        return Vec::new();
    }

    // maximal strictly increasing runs, as index ranges into `matched`
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for index in 1..matched.len() {
        if matched[index].1 <= matched[index - 1].1 {
            runs.push((start, index));
            start = index;
        }
    }
    runs.push((start, matched.len()));

    let mut chosen: Vec<(usize, usize)> = matched[runs[0].0..runs[0].1].to_vec();
    let mut running_max = matched[runs[0].1 - 1].1;
    let mut extended = false;
    for &(run_start, run_end) in &runs[1..] {
        if matched[run_start].1 > running_max {
            chosen.extend_from_slice(&matched[run_start..run_end]);
            running_max = matched[run_end - 1].1;
            extended = true;
        }
    }
    if !extended && runs.len() > 1 {
        let mut best = runs[0];
        for &(run_start, run_end) in &runs[1..] {
            if run_end - run_start > best.1 - best.0 {
                best = (run_start, run_end);
            }
        }
        chosen = matched[best.0..best.1].to_vec();
    }
    chosen
}
