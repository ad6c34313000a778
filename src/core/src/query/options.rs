//! Immutable query options
//!
//! `QueryOptions` are compared and hashed by value so they can key the
//! per-holder calculator caches. Typed extension options are stored behind a
//! type-erased value that still participates in equality and hashing.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::data::{DataQueryOrderFunction, DataTypeFilterFunction};
use super::flag::{Flag, FlagSet};
use crate::context::{ContextSatisfyMode, ImmutableContextSet, SERVER_KEY, WORLD_KEY};
use crate::node::Node;

/// Ordering function for the normal/transient layers
pub const DATA_QUERY_ORDER: OptionKey<DataQueryOrderFunction> = OptionKey::new("data_query_order");

/// Filter function for the normal/transient layers
pub const DATA_TYPE_FILTER: OptionKey<DataTypeFilterFunction> = OptionKey::new("data_type_filter");

/// How node contexts are matched against the query context
pub const CONTEXT_SATISFY_MODE: OptionKey<ContextSatisfyMode> =
    OptionKey::new("context_satisfy_mode");

/// Whether a query is evaluated against a context set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Contextual,
    NonContextual,
}

/// Typed key of an extension option
///
/// Two keys are the same option when both the name and the value type match.
pub struct OptionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> OptionKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: 'static> OptionKey<T> {
    fn id(&self) -> OptionKeyId {
        OptionKeyId {
            name: self.name,
            type_id: TypeId::of::<T>(),
        }
    }
}

impl<T> Clone for OptionKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OptionKey<T> {}

impl<T> fmt::Debug for OptionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionKey({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct OptionKeyId {
    name: &'static str,
    type_id: TypeId,
}

/// Type-erased option value that keeps value equality and hashing
trait OptionValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn OptionValue) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T> OptionValue for T
where
    T: Any + Eq + Hash + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn OptionValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }
}

/// Immutable configuration of a single permission query
#[derive(Debug, Clone)]
pub struct QueryOptions {
    mode: QueryMode,
    context: ImmutableContextSet,
    flags: FlagSet,
    options: BTreeMap<OptionKeyId, Arc<dyn OptionValue>>,
}

impl QueryOptions {
    /// Contextual options with an empty context and every flag set
    pub fn default_contextual() -> Self {
        Self::builder(QueryMode::Contextual).build()
    }

    /// Non-contextual options with every flag set
    pub fn non_contextual() -> Self {
        Self::builder(QueryMode::NonContextual).build()
    }

    /// Contextual options for the given context
    pub fn contextual(context: ImmutableContextSet) -> Self {
        Self::builder(QueryMode::Contextual).context(context).build()
    }

    pub fn builder(mode: QueryMode) -> QueryOptionsBuilder {
        QueryOptionsBuilder {
            mode,
            context: ImmutableContextSet::empty(),
            flags: FlagSet::default(),
            options: BTreeMap::new(),
        }
    }

    /// Builder seeded with these options
    pub fn to_builder(&self) -> QueryOptionsBuilder {
        QueryOptionsBuilder {
            mode: self.mode,
            context: self.context.clone(),
            flags: self.flags,
            options: self.options.clone(),
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Query context; always empty for non-contextual options
    pub fn context(&self) -> &ImmutableContextSet {
        &self.context
    }

    pub fn flags(&self) -> FlagSet {
        self.flags
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Looks up a typed extension option
    pub fn option<T: Any>(&self, key: &OptionKey<T>) -> Option<&T> {
        self.options
            .get(&key.id())
            .and_then(|value| value.as_ref().as_any().downcast_ref::<T>())
    }

    fn satisfy_mode(&self) -> ContextSatisfyMode {
        self.option(&CONTEXT_SATISFY_MODE).copied().unwrap_or_default()
    }

    /// Tests a context set against the query context
    pub fn satisfies(&self, contexts: &ImmutableContextSet) -> bool {
        match self.mode {
            QueryMode::NonContextual => true,
            QueryMode::Contextual => contexts.is_satisfied_by(&self.context, self.satisfy_mode()),
        }
    }

    /// Tests whether a node applies to this query
    ///
    /// Besides context satisfaction, nodes lacking a `server` or `world`
    /// context are dropped when the matching include flag is cleared.
    /// Inheritance nodes are governed by the `ApplyInheritance…` flags.
    pub fn accepts(&self, node: &Node) -> bool {
        if self.mode == QueryMode::NonContextual {
            return true;
        }

        let (server_flag, world_flag) = if node.is_inheritance() {
            (
                Flag::ApplyInheritanceNodesWithoutServerContext,
                Flag::ApplyInheritanceNodesWithoutWorldContext,
            )
        } else {
            (
                Flag::IncludeNodesWithoutServerContext,
                Flag::IncludeNodesWithoutWorldContext,
            )
        };

        if !self.flag(server_flag) && !node.contexts().contains_key(SERVER_KEY) {
            return false;
        }
        if !self.flag(world_flag) && !node.contexts().contains_key(WORLD_KEY) {
            return false;
        }
        self.satisfies(node.contexts())
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::default_contextual()
    }
}

impl PartialEq for QueryOptions {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.context == other.context
            && self.flags == other.flags
            && self.options.len() == other.options.len()
            && self
                .options
                .iter()
                .zip(other.options.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.dyn_eq(vb.as_ref()))
    }
}

impl Eq for QueryOptions {}

impl Hash for QueryOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mode.hash(state);
        self.context.hash(state);
        self.flags.hash(state);
        for (key, value) in &self.options {
            key.hash(state);
            value.dyn_hash(state);
        }
    }
}

impl fmt::Display for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            QueryMode::NonContextual => write!(f, "non-contextual")?,
            QueryMode::Contextual => write!(f, "contextual[{}]", self.context)?,
        }
        let flags: Vec<String> = self.flags.iter().map(|flag| format!("{:?}", flag)).collect();
        write!(f, " flags={}", flags.join("|"))
    }
}

/// Builder for [`QueryOptions`]
#[derive(Debug, Clone)]
pub struct QueryOptionsBuilder {
    mode: QueryMode,
    context: ImmutableContextSet,
    flags: FlagSet,
    options: BTreeMap<OptionKeyId, Arc<dyn OptionValue>>,
}

impl QueryOptionsBuilder {
    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn context(mut self, context: ImmutableContextSet) -> Self {
        self.context = context;
        self
    }

    pub fn flag(mut self, flag: Flag, on: bool) -> Self {
        self.flags = self.flags.with(flag, on);
        self
    }

    pub fn flags(mut self, flags: FlagSet) -> Self {
        self.flags = flags;
        self
    }

    /// Sets a typed extension option, replacing any previous value
    pub fn option<T>(mut self, key: OptionKey<T>, value: T) -> Self
    where
        T: Any + Eq + Hash + fmt::Debug + Send + Sync,
    {
        self.options.insert(key.id(), Arc::new(value));
        self
    }

    pub fn remove_option<T: 'static>(mut self, key: OptionKey<T>) -> Self {
        self.options.remove(&key.id());
        self
    }

    pub fn build(self) -> QueryOptions {
        let context = match self.mode {
            QueryMode::Contextual => self.context,
            QueryMode::NonContextual => ImmutableContextSet::empty(),
        };
        QueryOptions {
            mode: self.mode,
            context,
            flags: self.flags,
            options: self.options,
        }
    }
}
