//! Generation-guarded single-slot cache
//!
//! Every invalidation bumps a generation counter. A computation started under
//! generation `G` only publishes its value if the counter still reads `G`
//! when it finishes, so a slow computation can never overwrite a newer
//! invalidation.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Most-recently-computed value cache
#[derive(Debug)]
pub struct MostRecentCache<T> {
    generation: AtomicU64,
    slot: Mutex<Option<(u64, T)>>,
    /// Held only while recomputing
    refresh: Mutex<()>,
}

impl<T: Clone> MostRecentCache<T> {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            slot: Mutex::new(None),
            refresh: Mutex::new(()),
        }
    }

    fn current(&self) -> Option<T> {
        let generation = self.generation.load(Ordering::Acquire);
        match &*self.slot.lock() {
            Some((stored, value)) if *stored == generation => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the cached value, computing it with `supplier` on a miss
    pub fn get<F>(&self, supplier: F) -> T
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.current() {
            return value;
        }

        let _guard = self.refresh.lock();
        if let Some(value) = self.current() {
            return value;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = supplier();

        let mut slot = self.slot.lock();
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some((generation, value.clone()));
        }
        value
    }

    pub fn get_if_present(&self) -> Option<T> {
        self.current()
    }

    /// Current generation, bumped by every [`invalidate`](Self::invalidate)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.slot.lock() = None;
    }
}

impl<T: Clone> Default for MostRecentCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
