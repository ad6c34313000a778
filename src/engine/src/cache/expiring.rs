//! Single-value cache that recomputes after a fixed time-to-live
//!
//! Reads only take a shared read lock. Recomputation uses double-checked
//! locking so only one caller runs the supplier for a given expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// Cached value with the instant it was computed
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Time-expiring single-slot cache
#[derive(Debug)]
pub struct ExpiringCache<T> {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry<T>>>,
    /// Held only while recomputing
    refresh: Mutex<()>,
    /// Bumped by every invalidation
    generation: AtomicU64,
}

impl<T: Clone> ExpiringCache<T> {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `ttl` - How long a computed value stays valid
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh(&self) -> Option<T> {
        self.entry
            .read()
            .as_ref()
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// Returns the cached value, computing it with `supplier` if absent or expired
    ///
    /// A value computed while an [`invalidate`](Self::invalidate) runs is
    /// returned to its caller but not stored.
    pub fn get<F>(&self, supplier: F) -> T
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.fresh() {
            return value;
        }

        let _guard = self.refresh.lock();
        if let Some(value) = self.fresh() {
            return value;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = supplier();

        let mut entry = self.entry.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *entry = Some(CacheEntry {
                value: value.clone(),
                created_at: Instant::now(),
            });
        }
        value
    }

    /// Returns the cached value without computing
    pub fn get_if_present(&self) -> Option<T> {
        self.fresh()
    }

    /// Forces the next [`get`](Self::get) to recompute
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.entry.write() = None;
    }
}
