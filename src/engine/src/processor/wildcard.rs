//! Dot-segment wildcard processor

use std::collections::HashMap;
use std::sync::Arc;

use permweave_core::{Node, NodeKind};

use crate::calculator::TristateResult;

use super::source::DerivedState;
use super::{ProcessorKind, SourceSnapshot};

/// Wildcard nodes indexed by prefix
#[derive(Debug, Default)]
struct WildcardIndex {
    prefixes: HashMap<String, Arc<Node>>,
    root: Option<Arc<Node>>,
}

impl WildcardIndex {
    fn build(source: &SourceSnapshot) -> Self {
        let mut index = WildcardIndex::default();
        for (key, node) in source.nodes() {
            if let NodeKind::Wildcard { prefix } = NodeKind::parse(key) {
                if prefix.is_empty() {
                    index.root.get_or_insert_with(|| Arc::clone(node));
                } else {
                    index.prefixes.entry(prefix).or_insert_with(|| Arc::clone(node));
                }
            }
        }
        index
    }
}

/// Matches `a.b.*` style nodes, most specific prefix first, then root `*`
///
/// Only proper prefixes are tested: `a.b.*` applies to `a.b.c` but not to
/// `a.b` itself.
#[derive(Debug)]
pub struct WildcardProcessor {
    index: DerivedState<WildcardIndex>,
}

impl WildcardProcessor {
    pub fn new() -> Self {
        Self {
            index: DerivedState::new(),
        }
    }

    pub fn evaluate(&self, permission: &str, source: &SourceSnapshot) -> Option<TristateResult> {
        let index = self.index.get(source, WildcardIndex::build);
        let index = &index.value;

        let mut prefix = permission;
        while let Some(end) = prefix.rfind('.') {
            prefix = &prefix[..end];
            if prefix.is_empty() {
                continue;
            }
            if let Some(node) = index.prefixes.get(prefix) {
                return Some(TristateResult::from_node(node, ProcessorKind::Wildcard));
            }
        }

        index
            .root
            .as_ref()
            .map(|node| TristateResult::from_node(node, ProcessorKind::Wildcard))
    }

    pub fn invalidate(&self) {
        self.index.invalidate();
    }
}

impl Default for WildcardProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::{example_snapshot, snapshot_of};
    use permweave_core::Tristate;

    fn check(processor: &WildcardProcessor, source: &SourceSnapshot, permission: &str) -> Option<(Tristate, String)> {
        processor
            .evaluate(permission, source)
            .map(|r| (r.result(), r.node().map(|n| n.key().to_string()).unwrap_or_default()))
    }

    #[test]
    fn test_most_specific_wildcard_wins() {
        let source = example_snapshot();
        let processor = WildcardProcessor::new();

        assert_eq!(
            check(&processor, &source, "one.two.three.test"),
            Some((Tristate::False, "one.two.three.*".into()))
        );
        assert_eq!(
            check(&processor, &source, "one.two.test"),
            Some((Tristate::False, "one.two.*".into()))
        );
        assert_eq!(check(&processor, &source, "one.test"), Some((Tristate::False, "one.*".into())));
        assert_eq!(check(&processor, &source, "test"), Some((Tristate::False, "*".into())));
    }

    #[test]
    fn test_precedence_example() {
        let source = snapshot_of(1, &[("one.two.*", false), ("one.*", true), ("*", false)]);
        let processor = WildcardProcessor::new();

        assert_eq!(check(&processor, &source, "one.two.three").map(|r| r.0), Some(Tristate::False));
        assert_eq!(check(&processor, &source, "one.three").map(|r| r.0), Some(Tristate::True));
        assert_eq!(check(&processor, &source, "three.four").map(|r| r.0), Some(Tristate::False));
    }

    #[test]
    fn test_wildcard_does_not_match_its_own_prefix() {
        let source = snapshot_of(1, &[("a.b.*", true)]);
        let processor = WildcardProcessor::new();
        assert!(processor.evaluate("a.b", &source).is_none());
        assert!(processor.evaluate("a.b.c", &source).is_some());
    }

    #[test]
    fn test_wildcard_over_group_namespace() {
        let source = snapshot_of(1, &[("group.*", true), ("group.staff.*", false), ("other.*", true)]);
        let processor = WildcardProcessor::new();
        assert_eq!(
            check(&processor, &source, "group.vip"),
            Some((Tristate::True, "group.*".into()))
        );
        assert_eq!(
            check(&processor, &source, "group.staff.kick"),
            Some((Tristate::False, "group.staff.*".into()))
        );
        assert_eq!(check(&processor, &source, "other.vip").map(|r| r.0), Some(Tristate::True));
    }

    #[test]
    fn test_quoted_root_wildcard() {
        let source = snapshot_of(1, &[("'*'", true)]);
        let processor = WildcardProcessor::new();
        assert_eq!(check(&processor, &source, "any.thing").map(|r| r.0), Some(Tristate::True));
    }

    #[test]
    fn test_index_follows_new_snapshot() {
        let processor = WildcardProcessor::new();
        let first = snapshot_of(1, &[("a.*", true)]);
        assert!(processor.evaluate("a.b", &first).is_some());

        let second = snapshot_of(2, &[("b.*", true)]);
        assert!(processor.evaluate("a.b", &second).is_none());
        assert!(processor.evaluate("b.c", &second).is_some());
    }
}
