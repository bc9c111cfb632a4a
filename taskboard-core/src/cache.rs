//! Local task cache contract.
//!
//! Both operations are fail-soft: a broken cache degrades to "nothing
//! cached", it never interrupts the board.

use crate::task::Task;
use std::sync::Mutex;

pub trait TaskCache {
    /// Last saved list, or `None` when missing or unreadable.
    fn load(&self) -> Option<Vec<Task>>;

    /// Replace the stored list. Errors are logged and swallowed.
    fn save(&self, tasks: &[Task]);
}

/// In-memory cache holding the serialized JSON, same as a storage key would.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Mutex<Option<String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw stored text (may be garbage, to exercise the fail-soft path).
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn with_tasks(tasks: &[Task]) -> Self {
        let cache = Self::new();
        cache.save(tasks);
        cache
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

impl TaskCache for MemoryCache {
    fn load(&self) -> Option<Vec<Task>> {
        let raw = self.raw()?;
        match serde_json::from_str(&raw) {
            Ok(tasks) => Some(tasks),
            Err(e) => {
                tracing::warn!("ignoring unreadable cached tasks: {e}");
                None
            }
        }
    }

    fn save(&self, tasks: &[Task]) {
        let json = match serde_json::to_string(tasks) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("failed to serialize tasks for cache: {e}");
                return;
            }
        };
        match self.slot.lock() {
            Ok(mut slot) => *slot = Some(json),
            Err(e) => tracing::warn!("cache slot poisoned: {e}"),
        }
    }
}

impl<C: TaskCache + ?Sized> TaskCache for &C {
    fn load(&self) -> Option<Vec<Task>> {
        (**self).load()
    }

    fn save(&self, tasks: &[Task]) {
        (**self).save(tasks)
    }
}
