//! Result of a single permission check

use std::fmt;
use std::sync::Arc;

use permweave_core::{Node, Tristate};

use crate::processor::ProcessorKind;

/// Tristate outcome plus where it came from
///
/// `overridden` records the result an override processor replaced. It is kept
/// for diagnostics and never influences `result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TristateResult {
    result: Tristate,
    node: Option<Arc<Node>>,
    processor: Option<ProcessorKind>,
    overridden: Option<Arc<TristateResult>>,
}

impl TristateResult {
    pub fn undefined() -> Self {
        Self {
            result: Tristate::Undefined,
            node: None,
            processor: None,
            overridden: None,
        }
    }

    /// Result produced by `processor`, optionally traced to a node
    ///
    /// An undefined value carries no origin.
    pub fn of(result: Tristate, node: Option<Arc<Node>>, processor: ProcessorKind) -> Self {
        if !result.is_defined() {
            return Self::undefined();
        }
        Self {
            result,
            node,
            processor: Some(processor),
            overridden: None,
        }
    }

    /// Result taken from a matching node's value
    pub fn from_node(node: &Arc<Node>, processor: ProcessorKind) -> Self {
        Self::of(Tristate::of(node.value()), Some(Arc::clone(node)), processor)
    }

    /// Records `previous` as the result this one replaced
    pub fn overriding(mut self, previous: TristateResult) -> Self {
        self.overridden = Some(Arc::new(previous));
        self
    }

    pub fn result(&self) -> Tristate {
        self.result
    }

    /// The node that produced the result, if any
    pub fn node(&self) -> Option<&Arc<Node>> {
        self.node.as_ref()
    }

    pub fn processor(&self) -> Option<&ProcessorKind> {
        self.processor.as_ref()
    }

    pub fn overridden(&self) -> Option<&TristateResult> {
        self.overridden.as_deref()
    }

    pub fn is_defined(&self) -> bool {
        self.result.is_defined()
    }
}

impl Default for TristateResult {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Display for TristateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.result)?;
        if let (Some(processor), Some(node)) = (&self.processor, &self.node) {
            write!(f, " ({} via {})", node.key(), processor)?;
        } else if let Some(processor) = &self.processor {
            write!(f, " (via {})", processor)?;
        }
        if let Some(overridden) = &self.overridden {
            write!(f, " overriding [{}]", overridden)?;
        }
        Ok(())
    }
}
