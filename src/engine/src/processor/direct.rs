//! Exact-match processor

use crate::calculator::TristateResult;

use super::{ProcessorKind, SourceSnapshot};

/// Looks the permission up verbatim in the source map
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectProcessor;

impl DirectProcessor {
    pub fn evaluate(&self, permission: &str, source: &SourceSnapshot) -> Option<TristateResult> {
        source
            .get(permission)
            .map(|node| TristateResult::from_node(node, ProcessorKind::Direct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::example_snapshot;
    use permweave_core::Tristate;

    #[test]
    fn test_direct_lookup() {
        let source = example_snapshot();
        let result = DirectProcessor.evaluate("test.node1", &source).unwrap();
        assert_eq!(result.result(), Tristate::True);
        assert_eq!(result.processor(), Some(&ProcessorKind::Direct));
        assert_eq!(result.node().map(|n| n.key()), Some("test.node1"));

        let result = DirectProcessor.evaluate("test.node2", &source).unwrap();
        assert_eq!(result.result(), Tristate::False);

        assert!(DirectProcessor.evaluate("test", &source).is_none());
    }
}
