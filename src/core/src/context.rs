//! Immutable context sets
//!
//! A context set is a multimap of `key -> {values}` describing where a node
//! applies (for example `server=survival`, `world=nether`). Keys and values
//! are trimmed and lowercased on insertion so comparisons never depend on
//! case.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Context key naming the server a node applies to
pub const SERVER_KEY: &str = "server";

/// Context key naming the world a node applies to
pub const WORLD_KEY: &str = "world";

/// How a node's context set is tested against a query's context set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSatisfyMode {
    /// For every key in the node's set, the query holds at least one of its values
    #[default]
    AtLeastOneValuePerKey,
    /// Every `(key, value)` pair of the node's set is present in the query
    AllValuesPerKey,
}

/// Immutable, ordered multimap of context entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImmutableContextSet {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ImmutableContextSet {
    /// Returns the empty (global) context set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a context set
    pub fn builder() -> ContextSetBuilder {
        ContextSetBuilder::default()
    }

    /// Builds a set holding a single entry
    pub fn of(key: &str, value: &str) -> Result<Self> {
        Self::builder().add(key, value).map(ContextSetBuilder::build)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `(key, value)` pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.trim().to_lowercase())
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.entries
            .get(&key.trim().to_lowercase())
            .map_or(false, |values| values.contains(&value.trim().to_lowercase()))
    }

    /// Values held for `key`, if any
    pub fn values(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(&key.trim().to_lowercase())
    }

    /// Iterates every `(key, value)` pair in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Tests whether this set is satisfied by `other`
    ///
    /// # Arguments
    ///
    /// * `other` - The context set of the query
    /// * `mode` - How multi-valued keys are compared
    ///
    /// # Returns
    ///
    /// `true` if every requirement of `self` is met by `other`. The empty set
    /// is satisfied by anything.
    pub fn is_satisfied_by(&self, other: &ImmutableContextSet, mode: ContextSatisfyMode) -> bool {
        self.entries.iter().all(|(key, values)| {
            let Some(theirs) = other.entries.get(key) else {
                return false;
            };
            match mode {
                ContextSatisfyMode::AtLeastOneValuePerKey => {
                    values.iter().any(|v| theirs.contains(v))
                }
                ContextSatisfyMode::AllValuesPerKey => values.is_subset(theirs),
            }
        })
    }
}

impl fmt::Display for ImmutableContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(global)");
        }
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Builder for [`ImmutableContextSet`]
#[derive(Debug, Clone, Default)]
pub struct ContextSetBuilder {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ContextSetBuilder {
    /// Adds an entry, rejecting blank keys or values
    pub fn add(mut self, key: &str, value: &str) -> Result<Self> {
        let key = key.trim().to_lowercase();
        let value = value.trim().to_lowercase();
        if key.is_empty() {
            return Err(CoreError::invalid_context("key is empty"));
        }
        if value.is_empty() {
            return Err(CoreError::invalid_context(format!("value for '{}' is empty", key)));
        }
        self.entries.entry(key).or_default().insert(value);
        Ok(self)
    }

    /// Merges every entry of an existing set
    pub fn add_all(mut self, other: &ImmutableContextSet) -> Self {
        for (k, vs) in &other.entries {
            self.entries.entry(k.clone()).or_default().extend(vs.iter().cloned());
        }
        self
    }

    pub fn build(self) -> ImmutableContextSet {
        ImmutableContextSet {
            entries: self.entries,
        }
    }
}
