//! Primary group resolution
//!
//! A user's primary group is either what was stored for them or derived
//! from the groups they inherit. Results of every strategy are cached per
//! [`QueryOptions`] for a short time and dropped whenever the user changes.
//! Expired entries are evicted when a new query is cached.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use permweave_core::QueryOptions;

use crate::cache::ExpiringCache;
use crate::config::EngineConfig;
use crate::graph::InheritanceGraph;
use crate::model::{GroupSource, Holder, StateListener, User};

/// How a user's primary group is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryGroupCalculation {
    /// The stored value
    Stored,
    /// Heaviest directly assigned group
    #[default]
    ParentsByWeight,
    /// First group met while walking the whole inheritance graph
    AllParentsByWeight,
}

/// Resolves and caches the primary group of one user
pub struct PrimaryGroupResolver {
    config: Arc<EngineConfig>,
    groups: Arc<dyn GroupSource>,
    cache: DashMap<QueryOptions, Arc<ExpiringCache<String>>>,
}

impl PrimaryGroupResolver {
    pub fn new(config: Arc<EngineConfig>, groups: Arc<dyn GroupSource>) -> Self {
        Self {
            config,
            groups,
            cache: DashMap::new(),
        }
    }

    pub fn calculation(&self) -> PrimaryGroupCalculation {
        self.config.primary_group.calculation
    }

    /// Primary group of `holder` under `options`
    ///
    /// Always a lowercase, non-empty group name. Non-user holders resolve
    /// to the configured default group.
    pub fn resolve(&self, holder: &Holder, options: &QueryOptions) -> String {
        let Holder::User(user) = holder else {
            return self.default_group();
        };

        let cached = self.cache.get(options).map(|cache| Arc::clone(cache.value()));
        let cache = match cached {
            Some(cache) => cache,
            None => {
                self.evict_expired();
                Arc::clone(
                    self.cache
                        .entry(options.clone())
                        .or_insert_with(|| Arc::new(ExpiringCache::new(self.config.primary_group.cache_ttl())))
                        .value(),
                )
            }
        };
        cache.get(|| self.calculate(holder, user, options))
    }

    /// Drops entries whose value has expired, so queries that stop being
    /// asked for do not stay cached
    fn evict_expired(&self) {
        self.cache.retain(|_, cache| cache.get_if_present().is_some());
    }

    fn calculate(&self, holder: &Holder, user: &User, options: &QueryOptions) -> String {
        let graph = InheritanceGraph::new(self.groups.as_ref(), options, &self.config.group_weights);

        let computed = match self.calculation() {
            PrimaryGroupCalculation::Stored => None,
            PrimaryGroupCalculation::ParentsByWeight => graph
                .loaded_parents(holder)
                .into_iter()
                // max_by_key keeps the last maximum; reversed, that is the first
                .rev()
                .max_by_key(|group| group.effective_weight(graph.weights()))
                .map(|group| group.name().to_string()),
            PrimaryGroupCalculation::AllParentsByWeight => graph
                .traverse(holder.clone(), self.config.inheritance.traversal_algorithm)
                .find_map(|node| node.as_group().map(|group| group.name().to_string())),
        };

        trace!("Calculated primary group of {}: {:?}", user.uuid(), computed);
        computed.unwrap_or_else(|| self.fallback(user))
    }

    fn fallback(&self, user: &User) -> String {
        user.stored_primary_group()
            .unwrap_or_else(|| self.default_group())
    }

    fn default_group(&self) -> String {
        self.config.primary_group.default_group.to_lowercase()
    }

    /// Drops every cached result
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl StateListener for PrimaryGroupResolver {
    fn on_state_change(&self) {
        self.invalidate();
    }
}

impl std::fmt::Debug for PrimaryGroupResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryGroupResolver")
            .field("calculation", &self.calculation())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
