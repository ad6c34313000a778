//! Permission processors
//!
//! A calculator runs an ordered chain of processors. Each one sees the result
//! of the processors before it and either keeps it or produces a new one.
//!
//! # Features
//!
//! - [`DirectProcessor`]: exact lookup
//! - [`WildcardProcessor`]: `a.b.*` and root `*` nodes, most specific first
//! - [`LegacyChildWildcardProcessor`]: literal nodes implicitly grant children
//! - [`RegexProcessor`]: `r=<pattern>` nodes, full-string match
//! - [`OverrideProcessor`]: pluggable overrides via [`OverrideSource`]

pub mod direct;
pub mod legacy_child;
pub mod overrides;
pub mod pattern;
pub mod source;
pub mod wildcard;

use std::fmt;
use std::sync::Arc;

pub use direct::DirectProcessor;
pub use legacy_child::LegacyChildWildcardProcessor;
pub use overrides::{DefaultsOverride, FnOverride, OverrideProcessor, OverrideSource};
pub use pattern::RegexProcessor;
pub use source::{SourceMap, SourceSnapshot};
pub use wildcard::WildcardProcessor;

use crate::calculator::TristateResult;
use crate::error::Result;

/// Tag identifying the processor that produced a result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    Direct,
    Wildcard,
    LegacyChildWildcard,
    Regex,
    Override(Arc<str>),
}

impl ProcessorKind {
    pub fn override_named(name: &str) -> Self {
        ProcessorKind::Override(Arc::from(name))
    }

    /// Whether results of this kind come from a wildcard-style grammar
    pub fn is_wildcard_grammar(&self) -> bool {
        matches!(
            self,
            ProcessorKind::Wildcard | ProcessorKind::LegacyChildWildcard | ProcessorKind::Regex
        )
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Direct => write!(f, "direct"),
            ProcessorKind::Wildcard => write!(f, "wildcard"),
            ProcessorKind::LegacyChildWildcard => write!(f, "legacy-child-wildcard"),
            ProcessorKind::Regex => write!(f, "regex"),
            ProcessorKind::Override(name) => write!(f, "override:{}", name),
        }
    }
}

/// One stage of a calculator's chain
pub enum Processor {
    Direct(DirectProcessor),
    Wildcard(WildcardProcessor),
    LegacyChildWildcard(LegacyChildWildcardProcessor),
    Regex(RegexProcessor),
    Override(OverrideProcessor),
}

impl Processor {
    pub fn kind(&self) -> ProcessorKind {
        match self {
            Processor::Direct(_) => ProcessorKind::Direct,
            Processor::Wildcard(_) => ProcessorKind::Wildcard,
            Processor::LegacyChildWildcard(_) => ProcessorKind::LegacyChildWildcard,
            Processor::Regex(_) => ProcessorKind::Regex,
            Processor::Override(p) => p.kind(),
        }
    }

    /// Evaluates `permission` given the result of the earlier processors
    ///
    /// # Arguments
    ///
    /// * `prev` - Result produced so far
    /// * `permission` - Lowercased permission string
    /// * `source` - Snapshot captured for this check
    ///
    /// # Returns
    ///
    /// `Ok(None)` keeps `prev`; `Ok(Some(result))` replaces it.
    pub fn evaluate(
        &self,
        prev: &TristateResult,
        permission: &str,
        source: &SourceSnapshot,
    ) -> Result<Option<TristateResult>> {
        match self {
            Processor::Override(p) => p.evaluate(prev, permission),
            _ if prev.is_defined() => Ok(None),
            Processor::Direct(p) => Ok(p.evaluate(permission, source)),
            Processor::Wildcard(p) => Ok(p.evaluate(permission, source)),
            Processor::LegacyChildWildcard(p) => Ok(p.evaluate(permission, source)),
            Processor::Regex(p) => Ok(p.evaluate(permission, source)),
        }
    }

    /// Drops processor-local derived state
    pub fn invalidate(&self) {
        match self {
            Processor::Direct(_) => {}
            Processor::Wildcard(p) => p.invalidate(),
            Processor::LegacyChildWildcard(p) => p.invalidate(),
            Processor::Regex(p) => p.invalidate(),
            Processor::Override(p) => p.invalidate(),
        }
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processor({})", self.kind())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use permweave_core::Node;

    use super::SourceSnapshot;

    /// Node set used across processor and calculator tests
    pub const EXAMPLE_PERMISSIONS: &[(&str, bool)] = &[
        ("test.node1", true),
        ("test.node2", false),
        ("one.two.three.four", true),
        ("one.two.three.*", false),
        ("one.two.three", true),
        ("one.two.*", false),
        ("one.two", true),
        ("one.*", false),
        ("one", true),
        ("*", false),
        ("r=hello\\d+", true),
        ("R=rege(x(es)?|xps?)[1-5]", false),
        ("overridetest.*", true),
    ];

    pub fn snapshot_of(version: u64, entries: &[(&str, bool)]) -> SourceSnapshot {
        let nodes = entries
            .iter()
            .map(|(key, value)| (key.to_lowercase(), Arc::new(Node::new(*key, *value))))
            .collect();
        SourceSnapshot::new(version, nodes)
    }

    pub fn example_snapshot() -> SourceSnapshot {
        snapshot_of(1, EXAMPLE_PERMISSIONS)
    }
}
