use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::AbortHandle;

use crate::backend::BackendRole;

/// Identity of a hideable source: one per (backend, scene, source).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HideKey {
    /// Mixer owning the source.
    pub backend: BackendRole,
    /// Scene containing the source.
    pub scene: String,
    /// Source name.
    pub source: String,
}

impl HideKey {
    /// Build a key from borrowed parts.
    pub fn new(backend: BackendRole, scene: &str, source: &str) -> Self {
        Self {
            backend,
            scene: scene.to_string(),
            source: source.to_string(),
        }
    }
}

/// Outstanding deferred hide for one key.
///
/// `task` is `None` between [`HideTimers::reserve`] and [`HideTimers::arm`],
/// while the owning play is still showing the source.
#[derive(Debug)]
struct HideTimer {
    generation: u64,
    task: Option<AbortHandle>,
}

/// Table of pending hides; a new reservation for a key cancels and replaces the previous one.
#[derive(Debug, Default)]
pub struct HideTimers {
    timers: DashMap<HideKey, HideTimer>,
    next_generation: AtomicU64,
}

impl HideTimers {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for a new play, aborting any hide still pending for it.
    pub fn reserve(&self, key: &HideKey) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.timers.insert(
            key.clone(),
            HideTimer {
                generation,
                task: None,
            },
        );
        if let Some(HideTimer {
            task: Some(task), ..
        }) = previous
        {
            task.abort();
        }
        generation
    }

    /// Attach the hide task to its reservation.
    ///
    /// If another play superseded `generation` in the meantime the task is aborted
    /// instead, so at most one live hide task exists per key.
    pub fn arm(&self, key: &HideKey, generation: u64, task: AbortHandle) {
        match self.timers.get_mut(key) {
            Some(mut timer) if timer.generation == generation => {
                timer.task = Some(task);
            }
            _ => task.abort(),
        }
    }

    /// Consume the reservation when its hide fires. Returns `false` if it was superseded.
    pub fn fire(&self, key: &HideKey, generation: u64) -> bool {
        self.timers
            .remove_if(key, |_, timer| timer.generation == generation)
            .is_some()
    }

    /// Cancel every pending hide matching `predicate`; returns how many were cancelled.
    pub fn cancel_where(&self, mut predicate: impl FnMut(&HideKey) -> bool) -> usize {
        let mut cancelled = 0;
        self.timers.retain(|key, timer| {
            if !predicate(key) {
                return true;
            }
            if let Some(task) = timer.task.take() {
                task.abort();
            }
            cancelled += 1;
            false
        });
        cancelled
    }

    /// Cancel everything (shutdown).
    pub fn cancel_all(&self) -> usize {
        self.cancel_where(|_| true)
    }

    /// Whether a hide is pending for `key`.
    pub fn is_pending(&self, key: &HideKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Number of pending hides.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no hide is pending.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
