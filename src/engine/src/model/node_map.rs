//! Ordered node collection of a single holder layer

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use permweave_core::{ImmutableContextSet, Node, QueryOptions};

/// Identity of a node within a map: its lowercased key plus its contexts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeMapKey {
    key: String,
    contexts: ImmutableContextSet,
}

impl NodeMapKey {
    fn of(node: &Node) -> Self {
        Self {
            key: node.lookup_key(),
            contexts: node.contexts().clone(),
        }
    }
}

/// Insertion-ordered set of nodes
///
/// Setting a node whose key and contexts match an existing entry replaces
/// it in place.
#[derive(Debug, Clone, Default)]
pub struct NodeMap {
    nodes: IndexMap<NodeMapKey, Arc<Node>>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut map = Self::new();
        for node in nodes {
            map.insert(node);
        }
        map
    }

    /// Inserts or replaces a node, returning `false` if an identical node was already present
    pub fn insert(&mut self, node: Node) -> bool {
        let key = NodeMapKey::of(&node);
        if self.nodes.get(&key).map_or(false, |existing| **existing == node) {
            return false;
        }
        self.nodes.insert(key, Arc::new(node));
        true
    }

    /// Removes the node with `key` in exactly `contexts`
    pub fn remove(&mut self, key: &str, contexts: &ImmutableContextSet) -> Option<Arc<Node>> {
        let key = NodeMapKey {
            key: key.to_lowercase(),
            contexts: contexts.clone(),
        };
        self.nodes.shift_remove(&key)
    }

    /// Removes every node matching `predicate`, returning them
    pub fn remove_if<F>(&mut self, mut predicate: F) -> Vec<Arc<Node>>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut removed = Vec::new();
        self.nodes.retain(|_, node| {
            if predicate(node) {
                removed.push(Arc::clone(node));
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.nodes.is_empty();
        self.nodes.clear();
        changed
    }

    pub fn get(&self, key: &str, contexts: &ImmutableContextSet) -> Option<&Arc<Node>> {
        self.nodes.get(&NodeMapKey {
            key: key.to_lowercase(),
            contexts: contexts.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that apply to `options` at `now`
    ///
    /// Expired nodes are skipped. Nodes with more specific context sets come
    /// first; ties keep insertion order.
    pub fn filtered(&self, options: &QueryOptions, now: DateTime<Utc>) -> Vec<Arc<Node>> {
        let mut nodes: Vec<Arc<Node>> = self
            .nodes
            .values()
            .filter(|node| !node.has_expired_at(now) && options.accepts(node))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| b.contexts().len().cmp(&a.contexts().len()));
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn contextual(key: &str, server: &str) -> Node {
        Node::builder(key)
            .context("server", server)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_same_key_and_context_replaces_in_place() {
        let mut map = NodeMap::new();
        assert!(map.insert(Node::new("a", true)));
        assert!(map.insert(Node::new("b", true)));
        assert!(map.insert(Node::new("A", false)));
        assert!(!map.insert(Node::new("A", false)));

        let keys: Vec<_> = map.iter().map(|n| (n.key().to_string(), n.value())).collect();
        assert_eq!(keys, vec![("A".to_string(), false), ("b".to_string(), true)]);
    }

    #[test]
    fn test_different_contexts_are_distinct() {
        let mut map = NodeMap::new();
        map.insert(Node::new("a", true));
        map.insert(contextual("a", "lobby"));
        assert_eq!(map.len(), 2);

        let lobby = ImmutableContextSet::of("server", "lobby").unwrap();
        assert!(map.remove("A", &lobby).is_some());
        assert_eq!(map.len(), 1);
        assert!(map.get("a", &ImmutableContextSet::empty()).is_some());
    }

    #[test]
    fn test_filtered_orders_specific_first() {
        let mut map = NodeMap::new();
        map.insert(Node::new("global", true));
        map.insert(contextual("lobby.only", "lobby"));
        map.insert(contextual("survival.only", "survival"));

        let options = QueryOptions::contextual(ImmutableContextSet::of("server", "lobby").unwrap());
        let keys: Vec<_> = map
            .filtered(&options, Utc::now())
            .iter()
            .map(|n| n.key().to_string())
            .collect();
        assert_eq!(keys, vec!["lobby.only", "global"]);
    }

    #[test]
    fn test_filtered_skips_expired() {
        let now = Utc::now();
        let mut map = NodeMap::new();
        map.insert(
            Node::builder("temp")
                .expiry(now - Duration::seconds(1))
                .build()
                .unwrap(),
        );
        map.insert(Node::new("perm", true));
        assert_eq!(map.filtered(&QueryOptions::non_contextual(), now).len(), 1);
    }

    #[test]
    fn test_remove_if() {
        let mut map = NodeMap::from_nodes(vec![Node::new("a", true), Node::new("b", false)]);
        let removed = map.remove_if(|node| !node.value());
        assert_eq!(removed.len(), 1);
        assert_eq!(map.len(), 1);
        assert!(map.clear());
        assert!(!map.clear());
    }
}
