//! Groups

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use permweave_core::{DataType, NodeKind};

use super::holder::HolderNodes;

/// A named group of permissions other holders can inherit from
#[derive(Debug)]
pub struct Group {
    name: String,
    display_name: RwLock<Option<String>>,
    weight: RwLock<Option<i32>>,
    nodes: HolderNodes,
}

impl Group {
    /// Creates an empty group; the name is normalized to lowercase
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            display_name: RwLock::new(None),
            weight: RwLock::new(None),
            nodes: HolderNodes::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name if set, otherwise the name
    pub fn display_name(&self) -> String {
        self.display_name
            .read()
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn set_display_name(&self, display_name: Option<String>) {
        *self.display_name.write() = display_name;
    }

    /// Weight assigned directly to the group, if any
    pub fn explicit_weight(&self) -> Option<i32> {
        *self.weight.read()
    }

    pub fn set_weight(&self, weight: Option<i32>) {
        *self.weight.write() = weight;
        self.nodes.touch();
    }

    pub fn nodes(&self) -> &HolderNodes {
        &self.nodes
    }

    /// Highest weight set by a global, unexpired `weight.<n>` node
    fn weight_from_nodes(&self) -> Option<i32> {
        let now = Utc::now();
        [DataType::Normal, DataType::Transient]
            .into_iter()
            .flat_map(|data_type| {
                self.nodes
                    .nodes(data_type)
                    .iter()
                    .filter(|node| node.value() && node.contexts().is_empty() && !node.has_expired_at(now))
                    .filter_map(|node| match node.kind() {
                        NodeKind::Weight(weight) => Some(weight),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .max()
    }

    /// Weight used to order this group against others
    ///
    /// # Arguments
    ///
    /// * `configured` - Fallback weights by lowercase group name
    ///
    /// # Returns
    ///
    /// The highest `weight.<n>` node, else the explicit weight, else the
    /// configured weight, else 0.
    pub fn effective_weight(&self, configured: &HashMap<String, i32>) -> i32 {
        self.weight_from_nodes()
            .or_else(|| self.explicit_weight())
            .or_else(|| configured.get(&self.name).copied())
            .unwrap_or(0)
    }
}
