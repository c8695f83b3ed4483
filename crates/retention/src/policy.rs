//! Retention decisions.
//!
//! Everything here is pure: callers scan storage, hand the descriptors in,
//! and act on the returned decision.

use crate::RankKey;
use std::collections::HashSet;

/// Outcome of ranking sessions against a report cap.
///
/// Both lists are ordered best-ranked first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retain {
    pub keep: Vec<RankKey>,
    pub evict: Vec<RankKey>,
}

impl Retain {
    /// Whether `session_id` lost its slot.
    pub fn is_evicted(&self, session_id: &str) -> bool {
        self.evict.iter().any(|key| key.session_id == session_id)
    }

    /// Whether `session_id` keeps its slot.
    pub fn is_kept(&self, session_id: &str) -> bool {
        self.keep.iter().any(|key| key.session_id == session_id)
    }
}

/// Split `items` (in persist order) into the oldest surplus and the most
/// recent `max_count`.
///
/// Returns `(dropped, kept)`; both halves keep their original relative order.
pub fn split_oldest<T>(mut items: Vec<T>, max_count: usize) -> (Vec<T>, Vec<T>) {
    if items.len() <= max_count {
        return (Vec::new(), items);
    }
    let kept = items.split_off(items.len() - max_count);
    (items, kept)
}

/// Keep the last `max_count` events in persist order, dropping the oldest.
pub fn cap_events<T>(events: Vec<T>, max_count: usize) -> Vec<T> {
    split_oldest(events, max_count).1
}

/// Apply the hard open-session cap to ids sorted ascending (oldest first).
///
/// Returns `(kept, dropped)`.
pub fn cap_open_sessions<T>(open_ascending: Vec<T>, max_open: usize) -> (Vec<T>, Vec<T>) {
    let (dropped, kept) = split_oldest(open_ascending, max_open);
    (kept, dropped)
}

/// Rank `candidates` and keep the best `max_reports`.
pub fn select_survivors(
    candidates: impl IntoIterator<Item = RankKey>,
    max_reports: usize,
) -> Retain {
    let mut ranked: Vec<RankKey> = candidates.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    let mut seen = HashSet::new();
    ranked.retain(|key| seen.insert(key.session_id.clone()));

    let evict = if ranked.len() > max_reports {
        ranked.split_off(max_reports)
    } else {
        Vec::new()
    };

    Retain { keep: ranked, evict }
}
