//! Concurrent map that computes missing values on demand

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Compute-on-miss map
///
/// Values computed while a [`clear`](Self::clear) runs are handed back to
/// their caller but never stored, so a clear always wins over computations
/// that started before it.
#[derive(Debug)]
pub struct ComputeOnMissMap<K, V>
where
    K: Eq + Hash,
{
    map: DashMap<K, V>,
    generation: AtomicU64,
}

impl<K, V> ComputeOnMissMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the value for `key`, computing it with `compute` on a miss
    ///
    /// When two callers race on the same key, the first stored value wins and
    /// both observe it.
    pub fn get<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.map.get(&key) {
            return value.clone();
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = compute(&key);

        match self.map.entry(key) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                // re-checked under the shard lock clear() must also take
                if self.generation.load(Ordering::Acquire) == generation {
                    vacant.insert(value.clone());
                }
                value
            }
        }
    }

    pub fn get_if_present(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|value| value.clone())
    }

    /// Every current value, in no particular order
    pub fn values(&self) -> Vec<V> {
        self.map.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.map.remove(key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keeps current entries but stops computations already in flight from
    /// storing their values
    ///
    /// Used when stored values are refreshed in place rather than dropped.
    pub fn discard_in_flight(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Removes every entry and discards computations still in flight
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.map.clear();
    }
}

impl<K, V> Default for ComputeOnMissMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_computes_once_per_key() {
        let map = ComputeOnMissMap::new();
        let calls = AtomicUsize::new(0);
        let compute = |key: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            key.len()
        };

        assert_eq!(map.get("abc".to_string(), compute), 3);
        assert_eq!(map.get("abc".to_string(), compute), 3);
        assert_eq!(map.get("de".to_string(), compute), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_clear_discards_in_flight_computation() {
        let map = ComputeOnMissMap::new();
        let value = map.get("key", |_| {
            map.clear();
            1
        });
        assert_eq!(value, 1);
        assert!(map.get_if_present(&"key").is_none());
        assert_eq!(map.get("key", |_| 2), 2);
    }

    #[test]
    fn test_discard_in_flight_keeps_entries() {
        let map = ComputeOnMissMap::new();
        map.get("kept", |_| 1);
        let value = map.get("late", |_| {
            map.discard_in_flight();
            2
        });
        assert_eq!(value, 2);
        assert_eq!(map.get_if_present(&"kept"), Some(1));
        assert!(map.get_if_present(&"late").is_none());
    }

    #[test]
    fn test_remove_and_values() {
        let map = ComputeOnMissMap::new();
        map.get(1, |k| k * 10);
        map.get(2, |k| k * 10);
        let mut values = map.values();
        values.sort();
        assert_eq!(values, vec![10, 20]);
        assert_eq!(map.remove(&1), Some(10));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_concurrent_gets_agree() {
        let map = Arc::new(ComputeOnMissMap::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let map = Arc::clone(&map);
                thread::spawn(move || map.get("shared", |_| i))
            })
            .collect();

        let results: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = map.get_if_present(&"shared").unwrap();
        assert!(results.iter().all(|r| *r == first));
    }
}
