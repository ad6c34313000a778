//! Regex processor
//!
//! Nodes keyed `r=<pattern>` or `R=<pattern>` match any permission the
//! pattern matches in full. Patterns are compiled once per source string;
//! a pattern that fails to compile is remembered as never matching.

use std::sync::Arc;

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use permweave_core::node::regex_pattern;
use permweave_core::Node;

use crate::calculator::TristateResult;

use super::source::DerivedState;
use super::{ProcessorKind, SourceSnapshot};

/// Regex nodes in source order
fn regex_entries(source: &SourceSnapshot) -> Vec<(String, Arc<Node>)> {
    source
        .nodes()
        .values()
        .filter_map(|node| regex_pattern(node.key()).map(|pattern| (pattern.to_string(), Arc::clone(node))))
        .collect()
}

#[derive(Debug)]
pub struct RegexProcessor {
    entries: DerivedState<Vec<(String, Arc<Node>)>>,
    /// Compiled patterns by source; `None` marks a pattern that failed to compile
    compiled: DashMap<String, Option<Arc<Regex>>>,
}

impl RegexProcessor {
    pub fn new() -> Self {
        Self {
            entries: DerivedState::new(),
            compiled: DashMap::new(),
        }
    }

    fn compile(&self, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(compiled) = self.compiled.get(pattern) {
            return compiled.clone();
        }

        let compiled = match RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Some(Arc::new(regex)),
            Err(e) => {
                warn!("Ignoring malformed regex permission '{}': {}", pattern, e);
                None
            }
        };

        self.compiled
            .entry(pattern.to_string())
            .or_insert(compiled)
            .clone()
    }

    /// First regex node, in source order, whose pattern matches `permission`
    pub fn evaluate(&self, permission: &str, source: &SourceSnapshot) -> Option<TristateResult> {
        let entries = self.entries.get(source, regex_entries);

        entries.value.iter().find_map(|(pattern, node)| {
            self.compile(pattern)
                .filter(|regex| regex.is_match(permission))
                .map(|_| TristateResult::from_node(node, ProcessorKind::Regex))
        })
    }

    /// Number of patterns compiled so far, malformed ones included
    pub fn compiled_len(&self) -> usize {
        self.compiled.len()
    }

    pub fn invalidate(&self) {
        self.entries.invalidate();
        self.compiled.clear();
    }
}

impl Default for RegexProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::{example_snapshot, snapshot_of};
    use permweave_core::Tristate;
    use proptest::prelude::*;

    fn result(processor: &RegexProcessor, source: &SourceSnapshot, permission: &str) -> Tristate {
        processor
            .evaluate(permission, source)
            .map_or(Tristate::Undefined, |r| r.result())
    }

    #[test]
    fn test_regex_matches() {
        let source = example_snapshot();
        let processor = RegexProcessor::new();

        assert_eq!(result(&processor, &source, "hello"), Tristate::Undefined);
        assert_eq!(result(&processor, &source, "hello1"), Tristate::True);
        assert_eq!(result(&processor, &source, "hello123"), Tristate::True);
        assert_eq!(result(&processor, &source, "helloo"), Tristate::Undefined);
        assert_eq!(result(&processor, &source, "regex1"), Tristate::False);
        assert_eq!(result(&processor, &source, "regexes2"), Tristate::False);
        assert_eq!(result(&processor, &source, "regexp3"), Tristate::False);
        assert_eq!(result(&processor, &source, "regexps4"), Tristate::False);
    }

    #[test]
    fn test_full_string_match_only() {
        let source = snapshot_of(1, &[("r=abc", true)]);
        let processor = RegexProcessor::new();
        assert_eq!(result(&processor, &source, "abc"), Tristate::True);
        assert_eq!(result(&processor, &source, "xabcx"), Tristate::Undefined);
    }

    #[test]
    fn test_malformed_pattern_never_matches() {
        let source = snapshot_of(1, &[("r=(unclosed", true), ("r=.*", false)]);
        let processor = RegexProcessor::new();

        assert_eq!(result(&processor, &source, "(unclosed"), Tristate::False);
        assert_eq!(result(&processor, &source, "anything"), Tristate::False);
        // cached once, failure included
        assert_eq!(processor.compiled_len(), 2);
    }

    #[test]
    fn test_first_match_in_source_order_wins() {
        let source = snapshot_of(1, &[("r=a.*", true), ("r=ab.*", false)]);
        let processor = RegexProcessor::new();
        let matched = processor.evaluate("abc", &source).unwrap();
        assert_eq!(matched.result(), Tristate::True);
        assert_eq!(matched.node().map(|n| n.key()), Some("r=a.*"));
    }

    #[test]
    fn test_invalidate_clears_compiled_patterns() {
        let source = example_snapshot();
        let processor = RegexProcessor::new();
        result(&processor, &source, "hello1");
        assert!(processor.compiled_len() > 0);
        processor.invalidate();
        assert_eq!(processor.compiled_len(), 0);
    }

    proptest! {
        #[test]
        fn prop_digit_suffix_matches(n in 0u32..1_000_000) {
            let source = snapshot_of(1, &[("r=hello\\d+", true)]);
            let processor = RegexProcessor::new();
            let permission = format!("hello{}", n);
            prop_assert_eq!(result(&processor, &source, &permission), Tristate::True);
        }

        #[test]
        fn prop_non_matching_is_undefined(s in "[a-z]{1,12}") {
            let source = snapshot_of(1, &[("r=hello\\d+", true)]);
            let processor = RegexProcessor::new();
            prop_assert_eq!(result(&processor, &source, &s), Tristate::Undefined);
        }
    }
}
