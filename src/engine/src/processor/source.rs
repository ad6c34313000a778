//! Backing node map shared by every processor of a calculator

use std::sync::Arc;

use indexmap::IndexMap;

use permweave_core::Node;

use crate::cache::MostRecentCache;

/// Lowercased permission key to the node that set it, in resolution order
pub type SourceMap = IndexMap<String, Arc<Node>>;

/// Immutable, versioned view of a calculator's source nodes
///
/// Calculators swap whole snapshots; a check captures one snapshot and runs
/// every processor against it.
#[derive(Debug, Default)]
pub struct SourceSnapshot {
    version: u64,
    nodes: SourceMap,
}

impl SourceSnapshot {
    pub fn new(version: u64, nodes: SourceMap) -> Self {
        Self { version, nodes }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn nodes(&self) -> &SourceMap {
        &self.nodes
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Value derived from a snapshot, tagged with the snapshot version
#[derive(Debug)]
pub(crate) struct Derived<T> {
    pub version: u64,
    pub value: T,
}

/// Processor-local state derived from the source snapshot
///
/// The derived value is rebuilt lazily after [`invalidate`](Self::invalidate)
/// or when a newer snapshot shows up. A reader still holding an older snapshot
/// gets a private, uncached rebuild so it never mixes versions.
#[derive(Debug)]
pub(crate) struct DerivedState<T> {
    cache: MostRecentCache<Arc<Derived<T>>>,
}

impl<T> DerivedState<T> {
    pub fn new() -> Self {
        Self {
            cache: MostRecentCache::new(),
        }
    }

    pub fn get<F>(&self, source: &SourceSnapshot, build: F) -> Arc<Derived<T>>
    where
        F: Fn(&SourceSnapshot) -> T,
    {
        let compute = || {
            Arc::new(Derived {
                version: source.version(),
                value: build(source),
            })
        };

        let cached = self.cache.get(compute);
        if cached.version == source.version() {
            return cached;
        }

        if cached.version < source.version() {
            self.cache.invalidate();
            let refreshed = self.cache.get(compute);
            if refreshed.version == source.version() {
                return refreshed;
            }
        }

        compute()
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}
