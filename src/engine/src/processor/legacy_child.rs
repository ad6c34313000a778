//! Implicit child wildcard processor
//!
//! Older permission plugins treated every literal node `x` as also granting
//! `x.<anything>`. This processor reproduces that: the closest literal
//! ancestor of the permission decides.

use std::collections::HashMap;
use std::sync::Arc;

use permweave_core::{Node, NodeKind};

use crate::calculator::TristateResult;

use super::source::DerivedState;
use super::{ProcessorKind, SourceSnapshot};

/// Literal nodes that may act as implicit parents
fn literal_index(source: &SourceSnapshot) -> HashMap<String, Arc<Node>> {
    source
        .nodes()
        .iter()
        .filter(|(key, _)| !matches!(NodeKind::parse(key), NodeKind::Wildcard { .. } | NodeKind::Regex { .. }))
        .map(|(key, node)| (key.clone(), Arc::clone(node)))
        .collect()
}

#[derive(Debug)]
pub struct LegacyChildWildcardProcessor {
    literals: DerivedState<HashMap<String, Arc<Node>>>,
}

impl LegacyChildWildcardProcessor {
    pub fn new() -> Self {
        Self {
            literals: DerivedState::new(),
        }
    }

    pub fn evaluate(&self, permission: &str, source: &SourceSnapshot) -> Option<TristateResult> {
        let literals = self.literals.get(source, literal_index);

        let mut ancestor = permission;
        while let Some(end) = ancestor.rfind('.') {
            ancestor = &ancestor[..end];
            if let Some(node) = literals.value.get(ancestor) {
                return Some(TristateResult::from_node(node, ProcessorKind::LegacyChildWildcard));
            }
        }
        None
    }

    pub fn invalidate(&self) {
        self.literals.invalidate();
    }
}

impl Default for LegacyChildWildcardProcessor {
    fn default() -> Self {
        Self::new()
    }
}
