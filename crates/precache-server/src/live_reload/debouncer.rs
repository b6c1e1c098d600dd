//! Change debouncing.
//!
//! Editors and build tools emit several events per save. Events are collected
//! per path and only released once no new event for that path arrived within
//! the debounce window, so a burst of writes turns into one regeneration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A settled filesystem change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

struct Pending {
    kind: ChangeKind,
    deadline: Instant,
}

/// Collects raw watcher events and releases them once they settle.
///
/// `record` is called from the watcher thread, `drain_ready` from the
/// processing task.
pub(crate) struct ChangeDebouncer {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    window: Duration,
}

impl ChangeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record an event and push the path's deadline back by one window.
    pub fn record(&self, path: PathBuf, kind: ChangeKind) {
        use std::collections::hash_map::Entry;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.window;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(Pending { kind, deadline });
            }
            Entry::Occupied(mut entry) => match merge(entry.get().kind, kind) {
                Some(merged) => {
                    let pending = entry.get_mut();
                    pending.kind = merged;
                    pending.deadline = deadline;
                }
                // A file that appeared and vanished within one window
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Take every change whose deadline has passed, ordered by path.
    pub fn drain_ready(&self) -> Vec<Change> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready: Vec<Change> = pending
            .extract_if(|_, p| p.deadline <= now)
            .map(|(path, p)| Change { path, kind: p.kind })
            .collect();
        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }

    /// Returns true if no change is waiting.
    pub fn is_idle(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Merge a new event into a pending one; `None` drops the path.
#[allow(clippy::match_same_arms)]
fn merge(existing: ChangeKind, new: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::{Created, Modified, Removed};

    match (existing, new) {
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        (Modified, next) => Some(next),
        (Removed, Created | Modified) => Some(Modified),
        (Removed, Removed) => Some(Removed),
    }
}
