//! Permission nodes
//!
//! A node is a single stored grant or denial. Its key encodes the grammar it
//! matches with: a literal path (`a.b.c`), a dot-segment wildcard (`a.b.*` or
//! bare `*`), a regex (`r=<pattern>`), a group inheritance (`group.<name>`)
//! or a group weight (`weight.<n>`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{ContextSetBuilder, ImmutableContextSet};
use crate::error::{CoreError, Result};

/// Key prefix of inheritance nodes
pub const INHERITANCE_PREFIX: &str = "group.";

/// Key prefix of weight nodes
pub const WEIGHT_PREFIX: &str = "weight.";

/// Root wildcard key
pub const ROOT_WILDCARD: &str = "*";

/// Quoted root wildcard accepted as an alias of [`ROOT_WILDCARD`]
pub const ROOT_WILDCARD_QUOTED: &str = "'*'";

/// Grammar a node key is written in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Exact permission path
    Permission,
    /// `prefix.*`, or the root wildcard when `prefix` is empty
    Wildcard { prefix: String },
    /// `r=<pattern>` / `R=<pattern>`
    Regex { pattern: String },
    /// `group.<name>`
    Inheritance { group: String },
    /// `weight.<n>`
    Weight(i32),
}

impl NodeKind {
    /// Classifies a raw node key
    pub fn parse(key: &str) -> Self {
        let lower = key.to_lowercase();

        if lower == ROOT_WILDCARD || lower == ROOT_WILDCARD_QUOTED {
            return NodeKind::Wildcard {
                prefix: String::new(),
            };
        }
        if let Some(pattern) = regex_pattern(key) {
            return NodeKind::Regex {
                pattern: pattern.to_string(),
            };
        }
        // `group.*` is a wildcard over the `group` namespace, not an inheritance
        if let Some(prefix) = lower.strip_suffix(".*") {
            if !prefix.is_empty() {
                return NodeKind::Wildcard {
                    prefix: prefix.to_string(),
                };
            }
        }
        if let Some(group) = lower.strip_prefix(INHERITANCE_PREFIX) {
            if !group.is_empty() {
                return NodeKind::Inheritance {
                    group: group.to_string(),
                };
            }
        }
        if let Some(weight) = lower.strip_prefix(WEIGHT_PREFIX) {
            if let Ok(weight) = weight.parse::<i32>() {
                return NodeKind::Weight(weight);
            }
        }
        NodeKind::Permission
    }
}

/// Returns the pattern of a regex key (`r=` or `R=` prefix), if any
pub fn regex_pattern(key: &str) -> Option<&str> {
    key.strip_prefix("r=").or_else(|| key.strip_prefix("R="))
}

/// A single permission grant or denial
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    key: String,
    value: bool,
    #[serde(default)]
    contexts: ImmutableContextSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
}

impl Node {
    /// Creates a global, permanent node
    pub fn new(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value,
            contexts: ImmutableContextSet::empty(),
            expiry: None,
        }
    }

    /// Starts building a node
    pub fn builder(key: impl Into<String>) -> NodeBuilder {
        NodeBuilder {
            key: key.into(),
            value: true,
            contexts: ImmutableContextSet::builder(),
            expiry: None,
        }
    }

    /// Creates a `group.<name>` node granting inheritance from `group`
    pub fn inheritance(group: &str) -> Self {
        Self::new(format!("{}{}", INHERITANCE_PREFIX, group.trim().to_lowercase()), true)
    }

    /// Creates a `weight.<n>` node
    pub fn weight(weight: i32) -> Self {
        Self::new(format!("{}{}", WEIGHT_PREFIX, weight), true)
    }

    /// Key as stored
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lowercased key used for every lookup
    pub fn lookup_key(&self) -> String {
        self.key.to_lowercase()
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn contexts(&self) -> &ImmutableContextSet {
        &self.contexts
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::parse(&self.key)
    }

    /// Group this node inherits from, if it is an inheritance node
    pub fn inherited_group(&self) -> Option<String> {
        match self.kind() {
            NodeKind::Inheritance { group } => Some(group),
            _ => None,
        }
    }

    pub fn is_inheritance(&self) -> bool {
        matches!(self.kind(), NodeKind::Inheritance { .. })
    }

    pub fn is_temporary(&self) -> bool {
        self.expiry.is_some()
    }

    /// Whether the node has expired at `now`
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map_or(false, |expiry| expiry <= now)
    }

    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Same node with the opposite value
    pub fn negated(&self) -> Self {
        Self {
            value: !self.value,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let node: Node = serde_json::from_str(json)?;
        if node.key.trim().is_empty() {
            return Err(CoreError::invalid_node("key is empty"));
        }
        Ok(node)
    }
}

/// Builder for [`Node`]
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    key: String,
    value: bool,
    contexts: ContextSetBuilder,
    expiry: Option<DateTime<Utc>>,
}

impl NodeBuilder {
    pub fn value(mut self, value: bool) -> Self {
        self.value = value;
        self
    }

    /// Adds a single context entry
    pub fn context(mut self, key: &str, value: &str) -> Result<Self> {
        self.contexts = self.contexts.add(key, value)?;
        Ok(self)
    }

    /// Adds every entry of an existing context set
    pub fn with_contexts(mut self, contexts: &ImmutableContextSet) -> Self {
        self.contexts = self.contexts.add_all(contexts);
        self
    }

    /// Makes the node temporary
    pub fn expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn build(self) -> Result<Node> {
        if self.key.trim().is_empty() {
            return Err(CoreError::invalid_node("key is empty"));
        }
        Ok(Node {
            key: self.key,
            value: self.value,
            contexts: self.contexts.build(),
            expiry: self.expiry,
        })
    }
}
