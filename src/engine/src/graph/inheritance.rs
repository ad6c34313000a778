//! Inheritance graph of users and groups

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use permweave_core::{Flag, HolderId, QueryOptions};

use super::traversal::{Graph, Traversal, TraversalAlgorithm};
use crate::model::{Group, GroupSource, Holder};

/// Holders connected by their inheritance nodes, as seen under one set of query options
///
/// The graph is a view: it reads current holder state on every call and
/// holds no state of its own.
pub struct InheritanceGraph<'a> {
    groups: &'a dyn GroupSource,
    options: &'a QueryOptions,
    weights: &'a HashMap<String, i32>,
}

impl<'a> InheritanceGraph<'a> {
    /// # Arguments
    ///
    /// * `groups` - Where parent groups are looked up
    /// * `options` - Decides which inheritance nodes apply
    /// * `weights` - Configured fallback weights used for ordering
    pub fn new(
        groups: &'a dyn GroupSource,
        options: &'a QueryOptions,
        weights: &'a HashMap<String, i32>,
    ) -> Self {
        Self {
            groups,
            options,
            weights,
        }
    }

    /// Loaded parents of `holder` in the order its inheritance nodes resolve
    ///
    /// Parents that are not loaded are skipped, duplicates are dropped.
    pub fn loaded_parents(&self, holder: &Holder) -> Vec<Arc<Group>> {
        if !self.options.flag(Flag::ResolveInheritance) {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        holder
            .own_nodes(self.options)
            .iter()
            .filter(|node| node.value())
            .filter_map(|node| node.inherited_group())
            .filter(|name| seen.insert(name.clone()))
            .filter_map(|name| match self.groups.get_if_loaded(&name) {
                Some(group) => Some(group),
                None => {
                    debug!("Skipping parent group {} of {}: not loaded", name, holder.id());
                    None
                }
            })
            .collect()
    }

    /// Loaded parents of `holder`, heaviest first
    ///
    /// Ties in weight are broken by group name.
    pub fn parents(&self, holder: &Holder) -> Vec<Arc<Group>> {
        let mut parents: Vec<(i32, Arc<Group>)> = self
            .loaded_parents(holder)
            .into_iter()
            .map(|group| (group.effective_weight(self.weights), group))
            .collect();

        parents.sort_by(|(wa, a), (wb, b)| {
            Reverse(*wa)
                .cmp(&Reverse(*wb))
                .then_with(|| a.name().cmp(b.name()))
        });
        parents.into_iter().map(|(_, group)| group).collect()
    }

    pub fn weights(&self) -> &HashMap<String, i32> {
        self.weights
    }

    /// Walks every holder reachable from `root`, `root` included
    pub fn traverse(&self, root: Holder, algorithm: TraversalAlgorithm) -> Traversal<'_, Self> {
        algorithm.traverse(self, root)
    }
}

impl Graph for InheritanceGraph<'_> {
    type Node = Holder;
    type Id = HolderId;

    fn id(&self, node: &Holder) -> HolderId {
        node.id()
    }

    fn successors(&self, node: &Holder) -> Vec<Holder> {
        self.parents(node).into_iter().map(Holder::Group).collect()
    }
}
