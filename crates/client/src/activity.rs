// Activity log: ordered per-line mutation records with index rebasing.
//
// Every entry's index always equals the *current* position of the line
// it describes. Structural inserts shift entries right; deletes remove
// the entry for the deleted line and shift the rest left. At most one
// entry exists per line index: a new entry for an index supersedes any
// prior entry for that index.
//
// Entries are immutable values replaced wholesale on rebase. All
// mutation happens inside a single mutex scope; readers only ever get
// snapshots, so a concurrent UI refresh can never observe a partially
// rebased log. Change notifications are the session client's business
// and fire after the lock is released.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use cuesync_common::types::UpdateAction;

/// One recorded mutation event.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    /// Sequence-local identifier, unique within this log.
    pub id: u64,
    pub user_name: String,
    pub index: usize,
    pub at: DateTime<Utc>,
    pub action: UpdateAction,
}

/// Ordered record of per-line mutation events.
#[derive(Debug, Default)]
pub struct ActivityLog {
    inner: Mutex<LogState>,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<ActivityEntry>,
    next_id: u64,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation of the line at `index`, superseding any prior
    /// entry for that index.
    pub fn record(&self, user_name: &str, index: usize, action: UpdateAction, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.entries.retain(|entry| entry.index != index);
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(ActivityEntry {
            id,
            user_name: user_name.to_string(),
            index,
            at,
            action,
        });
    }

    /// Rebase after a structural insert at `position`: entries at or
    /// after it move one position right.
    pub fn shift_for_insert(&self, position: usize) {
        let mut state = self.lock();
        state.entries = state
            .entries
            .iter()
            .map(|entry| {
                if entry.index >= position {
                    ActivityEntry { index: entry.index + 1, ..entry.clone() }
                } else {
                    entry.clone()
                }
            })
            .collect();
    }

    /// Rebase after a structural delete at `position`: the entry for the
    /// deleted line (if any) is removed, entries after it move one
    /// position left. Returns whether an entry was removed.
    pub fn shift_for_delete(&self, position: usize) -> bool {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries = state
            .entries
            .iter()
            .filter(|entry| entry.index != position)
            .map(|entry| {
                if entry.index > position {
                    ActivityEntry { index: entry.index - 1, ..entry.clone() }
                } else {
                    entry.clone()
                }
            })
            .collect();
        before != state.entries.len()
    }

    /// Read-only copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drop every entry (a new session starts with a fresh log).
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.inner.lock().expect("activity log lock poisoned")
    }
}
