//! Assembling the node set a calculator works from

use std::sync::Arc;

use tracing::trace;

use permweave_core::{Node, QueryOptions};

use crate::config::EngineConfig;
use crate::graph::InheritanceGraph;
use crate::model::{GroupSource, Holder};
use crate::processor::SourceMap;

/// Resolves a holder's own and inherited nodes
pub struct NodeResolver {
    groups: Arc<dyn GroupSource>,
    config: Arc<EngineConfig>,
}

impl NodeResolver {
    pub fn new(groups: Arc<dyn GroupSource>, config: Arc<EngineConfig>) -> Self {
        Self { groups, config }
    }

    /// Nodes set directly on `holder` that apply under `options`
    pub fn own_nodes(&self, holder: &Holder, options: &QueryOptions) -> Vec<Arc<Node>> {
        holder.own_nodes(options)
    }

    /// Own nodes of every holder reachable from `holder`, root first
    ///
    /// Holders are visited in the configured traversal order. With
    /// inheritance resolution disabled only the root contributes.
    pub fn inherited_nodes(&self, holder: &Holder, options: &QueryOptions) -> Vec<Arc<Node>> {
        let graph = InheritanceGraph::new(self.groups.as_ref(), options, &self.config.group_weights);
        graph
            .traverse(holder.clone(), self.config.inheritance.traversal_algorithm)
            .flat_map(|node| node.own_nodes(options))
            .collect()
    }

    /// Merged permission map of `holder`
    ///
    /// The first node seen for each lowercase key wins, so the root and
    /// heavier groups take precedence.
    pub fn permission_map(&self, holder: &Holder, options: &QueryOptions) -> SourceMap {
        let map = Self::merge(self.inherited_nodes(holder, options));
        trace!("Resolved {} nodes for {}", map.len(), holder.id());
        map
    }

    /// Collapses `nodes` into a map keyed by lowercase key, first node winning
    pub fn merge(nodes: impl IntoIterator<Item = Arc<Node>>) -> SourceMap {
        let mut map = SourceMap::new();
        for node in nodes {
            map.entry(node.lookup_key()).or_insert(node);
        }
        map
    }
}

impl std::fmt::Debug for NodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeResolver")
            .field("algorithm", &self.config.inheritance.traversal_algorithm)
            .finish_non_exhaustive()
    }
}
