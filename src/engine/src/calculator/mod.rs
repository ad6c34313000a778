//! Permission calculator
//!
//! One calculator exists per (holder, query options) pair. It owns a
//! processor chain, the snapshot of the holder's merged nodes, and a
//! per-permission result cache.
//!
//! ```text
//! check_permission("A.B")
//!        │ lowercase
//!        ▼
//!  lookup cache ── hit ──► result
//!        │ miss
//!        ▼
//!  capture snapshot ─► Direct ─► Regex ─► Wildcard ─► LegacyChild ─► Overrides
//!        │
//!        ▼
//!  store (unless cleared meanwhile) ─► diagnostics sink
//! ```

pub mod diagnostics;
pub mod factory;
pub mod registry;
pub mod result;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{trace, warn};

use permweave_core::{HolderId, QueryOptions};

pub use diagnostics::{ChannelDiagnosticsSink, CheckRecord, DiagnosticsSink};
pub use factory::CalculatorFactory;
pub use registry::{InMemoryPermissionRegistry, PermissionRegistry};
pub use result::TristateResult;

use crate::cache::ComputeOnMissMap;
use crate::processor::{Processor, ProcessorKind, SourceMap, SourceSnapshot};

/// Who a calculator computes for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalculatorMetadata {
    pub holder: HolderId,
    pub query: QueryOptions,
}

impl CalculatorMetadata {
    pub fn new(holder: HolderId, query: QueryOptions) -> Self {
        Self { holder, query }
    }
}

/// Calculates and caches permission results for one holder and query
pub struct PermissionCalculator {
    metadata: CalculatorMetadata,
    processors: Vec<Processor>,
    source: RwLock<Arc<SourceSnapshot>>,
    lookup: ComputeOnMissMap<String, TristateResult>,
    registry: Option<Arc<dyn PermissionRegistry>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl PermissionCalculator {
    /// Creates a calculator with an empty source map
    pub fn new(metadata: CalculatorMetadata, processors: Vec<Processor>) -> Self {
        Self {
            metadata,
            processors,
            source: RwLock::new(Arc::new(SourceSnapshot::default())),
            lookup: ComputeOnMissMap::new(),
            registry: None,
            diagnostics: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn PermissionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn metadata(&self) -> &CalculatorMetadata {
        &self.metadata
    }

    /// Processor chain, in evaluation order
    pub fn processor_kinds(&self) -> Vec<ProcessorKind> {
        self.processors.iter().map(Processor::kind).collect()
    }

    /// Current source snapshot
    pub fn source(&self) -> Arc<SourceSnapshot> {
        Arc::clone(&self.source.read())
    }

    /// Number of cached permission results
    pub fn cached_len(&self) -> usize {
        self.lookup.len()
    }

    /// Checks a permission
    ///
    /// # Arguments
    ///
    /// * `permission` - Permission string, in any case
    ///
    /// # Returns
    ///
    /// The cached result if present, otherwise the result of running the
    /// processor chain against a single snapshot of the source map.
    pub fn check_permission(&self, permission: &str) -> TristateResult {
        let permission = permission.to_lowercase();
        let result = self
            .lookup
            .get(permission.clone(), |permission| self.compute(permission));

        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.record(CheckRecord {
                holder: self.metadata.holder.clone(),
                query: self.metadata.query.clone(),
                permission,
                result: result.clone(),
                checked_at: Utc::now(),
            });
        }
        result
    }

    fn compute(&self, permission: &str) -> TristateResult {
        if let Some(registry) = &self.registry {
            registry.offer(permission);
        }

        let source = self.source();
        let mut result = TristateResult::undefined();

        for processor in &self.processors {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                processor.evaluate(&result, permission, &source)
            }));

            match outcome {
                Ok(Ok(Some(next))) => result = next,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(
                        "Processor {} failed checking '{}' for {}: {}",
                        processor.kind(),
                        permission,
                        self.metadata.holder,
                        e
                    );
                }
                Err(_) => {
                    warn!(
                        "Processor {} panicked checking '{}' for {}",
                        processor.kind(),
                        permission,
                        self.metadata.holder
                    );
                }
            }
        }

        trace!("{} has '{}' = {}", self.metadata.holder, permission, result);
        result
    }

    /// Replaces the source map and clears cached results
    ///
    /// The new snapshot is installed before the cache is cleared, so a check
    /// racing this call either completes against the old snapshot (and its
    /// result is discarded by the clear) or sees the new snapshot.
    pub fn set_source_nodes(&self, nodes: SourceMap) {
        {
            let mut source = self.source.write();
            let version = source.version() + 1;
            *source = Arc::new(SourceSnapshot::new(version, nodes));
        }
        self.lookup.clear();
    }

    /// Clears cached results and processor-local derived state
    pub fn invalidate(&self) {
        self.lookup.clear();
        for processor in &self.processors {
            processor.invalidate();
        }
    }
}

impl std::fmt::Debug for PermissionCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCalculator")
            .field("metadata", &self.metadata)
            .field("processors", &self.processors)
            .field("cached", &self.lookup.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::processor::test_support::{snapshot_of, EXAMPLE_PERMISSIONS};
    use crate::processor::{
        DirectProcessor, FnOverride, LegacyChildWildcardProcessor, OverrideProcessor,
        RegexProcessor, WildcardProcessor,
    };
    use permweave_core::Tristate;

    fn metadata() -> CalculatorMetadata {
        CalculatorMetadata::new(HolderId::group("test"), QueryOptions::default_contextual())
    }

    fn calculator(processors: Vec<Processor>) -> PermissionCalculator {
        let calculator = PermissionCalculator::new(metadata(), processors);
        let source = snapshot_of(0, EXAMPLE_PERMISSIONS);
        calculator.set_source_nodes(source.nodes().clone());
        calculator
    }

    #[test]
    fn test_direct() {
        let calc = calculator(vec![Processor::Direct(DirectProcessor)]);

        assert_eq!(calc.check_permission("test").result(), Tristate::Undefined);
        assert_eq!(calc.check_permission("test.node1").result(), Tristate::True);
        assert_eq!(calc.check_permission("TEST.NODE2").result(), Tristate::False);

        let result = calc.check_permission("test.node1");
        assert_eq!(result.processor(), Some(&ProcessorKind::Direct));
        assert!(result.node().is_some());
        assert!(result.overridden().is_none());
    }

    #[test]
    fn test_wildcard_with_direct() {
        let calc = calculator(vec![
            Processor::Direct(DirectProcessor),
            Processor::Wildcard(WildcardProcessor::new()),
        ]);

        let cases = [
            ("one.two.three.four", true, ProcessorKind::Direct),
            ("one.two.three.test", false, ProcessorKind::Wildcard),
            ("one.two.three.*", false, ProcessorKind::Direct),
            ("one.two.three", true, ProcessorKind::Direct),
            ("one.two.test", false, ProcessorKind::Wildcard),
            ("one.two", true, ProcessorKind::Direct),
            ("one.test", false, ProcessorKind::Wildcard),
            ("one", true, ProcessorKind::Direct),
            ("test", false, ProcessorKind::Wildcard),
            ("*", false, ProcessorKind::Direct),
        ];

        for (permission, expected, kind) in cases {
            let result = calc.check_permission(permission);
            assert_eq!(result.result(), Tristate::of(expected), "{}", permission);
            assert_eq!(result.processor(), Some(&kind), "{}", permission);
            assert!(result.node().is_some());
        }
    }

    #[test]
    fn test_legacy_child_wildcard() {
        let calc = calculator(vec![
            Processor::Direct(DirectProcessor),
            Processor::LegacyChildWildcard(LegacyChildWildcardProcessor::new()),
        ]);

        assert_eq!(calc.check_permission("one").processor(), Some(&ProcessorKind::Direct));
        let result = calc.check_permission("one.test");
        assert_eq!(result.result(), Tristate::True);
        assert_eq!(result.processor(), Some(&ProcessorKind::LegacyChildWildcard));
        assert_eq!(calc.check_permission("one.two.test").result(), Tristate::True);
    }

    #[test]
    fn test_regex() {
        let calc = calculator(vec![
            Processor::Direct(DirectProcessor),
            Processor::Regex(RegexProcessor::new()),
        ]);

        assert_eq!(calc.check_permission("hello").result(), Tristate::Undefined);
        assert_eq!(calc.check_permission("hello1").result(), Tristate::True);
        assert_eq!(calc.check_permission("regexes2").result(), Tristate::False);
        assert_eq!(calc.check_permission("regexes2").processor(), Some(&ProcessorKind::Regex));
    }

    #[test]
    fn test_override_replaces_wildcard() {
        let deny = FnOverride::new("test-override", |permission: &str| {
            Ok(if permission == "overridetest.test" {
                Tristate::False
            } else {
                Tristate::Undefined
            })
        });
        let calc = calculator(vec![
            Processor::Direct(DirectProcessor),
            Processor::Wildcard(WildcardProcessor::new()),
            Processor::Override(OverrideProcessor::new(Arc::new(deny), true)),
        ]);

        let result = calc.check_permission("overridetest.test");
        assert_eq!(result.result(), Tristate::False);
        assert_eq!(result.processor(), Some(&ProcessorKind::override_named("test-override")));

        let overridden = result.overridden().unwrap();
        assert_eq!(overridden.result(), Tristate::True);
        assert_eq!(overridden.processor(), Some(&ProcessorKind::Wildcard));
    }

    #[test]
    fn test_failing_processor_is_isolated() {
        let failing = FnOverride::new("failing", |_: &str| Err(EngineError::Processor("boom".into())));
        let panicking = FnOverride::new("panicking", |_: &str| -> crate::error::Result<Tristate> {
            panic!("processor bug")
        });
        let calc = calculator(vec![
            Processor::Override(OverrideProcessor::new(Arc::new(failing), true)),
            Processor::Override(OverrideProcessor::new(Arc::new(panicking), true)),
            Processor::Direct(DirectProcessor),
        ]);

        assert_eq!(calc.check_permission("test.node1").result(), Tristate::True);
        assert_eq!(calc.check_permission("missing").result(), Tristate::Undefined);
    }

    #[test]
    fn test_results_are_cached_until_source_changes() {
        let calc = calculator(vec![Processor::Direct(DirectProcessor)]);
        calc.check_permission("test.node1");
        calc.check_permission("Test.Node1");
        assert_eq!(calc.cached_len(), 1);

        let replacement = snapshot_of(0, &[("test.node1", false)]);
        calc.set_source_nodes(replacement.nodes().clone());
        assert_eq!(calc.cached_len(), 0);
        assert_eq!(calc.check_permission("test.node1").result(), Tristate::False);
        assert_eq!(calc.source().version(), 2);
    }

    #[test]
    fn test_check_racing_source_swap_sees_one_snapshot() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Barrier;

        let inside_chain = Arc::new(Barrier::new(2));
        let swapped = Arc::new(Barrier::new(2));
        let blocked = Arc::new(AtomicBool::new(false));

        let pause = {
            let inside_chain = Arc::clone(&inside_chain);
            let swapped = Arc::clone(&swapped);
            let blocked = Arc::clone(&blocked);
            FnOverride::new("pause", move |_: &str| {
                if !blocked.swap(true, Ordering::SeqCst) {
                    inside_chain.wait();
                    swapped.wait();
                }
                Ok(Tristate::Undefined)
            })
        };
        let calc = PermissionCalculator::new(
            metadata(),
            vec![
                Processor::Override(OverrideProcessor::new(Arc::new(pause), false)),
                Processor::Direct(DirectProcessor),
                Processor::Wildcard(WildcardProcessor::new()),
            ],
        );
        calc.set_source_nodes(snapshot_of(0, &[("race.node", true), ("race.*", true)]).nodes().clone());

        let result = std::thread::scope(|scope| {
            let check = scope.spawn(|| calc.check_permission("race.node"));
            inside_chain.wait();
            calc.set_source_nodes(snapshot_of(0, &[("race.*", false)]).nodes().clone());
            swapped.wait();
            check.join().unwrap()
        });

        // started before the swap, so answered entirely from the old nodes
        assert_eq!(result.result(), Tristate::True);
        assert_eq!(result.processor(), Some(&ProcessorKind::Direct));
        assert_eq!(result.node().map(|n| (n.key(), n.value())), Some(("race.node", true)));

        // the old answer was not cached over the new nodes
        let result = calc.check_permission("race.node");
        assert_eq!(result.result(), Tristate::False);
        assert_eq!(result.processor(), Some(&ProcessorKind::Wildcard));
        assert_eq!(result.node().map(|n| (n.key(), n.value())), Some(("race.*", false)));
        assert_eq!(calc.cached_len(), 1);
    }

    #[test]
    fn test_invalidate_clears_cache() {
        let calc = calculator(vec![Processor::Regex(RegexProcessor::new())]);
        calc.check_permission("hello1");
        calc.invalidate();
        assert_eq!(calc.cached_len(), 0);
        assert_eq!(calc.check_permission("hello1").result(), Tristate::True);
    }

    #[test]
    fn test_registry_and_diagnostics() {
        let registry = Arc::new(InMemoryPermissionRegistry::new());
        let (sink, mut receiver) = ChannelDiagnosticsSink::new(16);
        let calc = calculator(vec![Processor::Direct(DirectProcessor)])
            .with_registry(registry.clone())
            .with_diagnostics(Arc::new(sink));

        calc.check_permission("Test.Node1");
        calc.check_permission("test.node1");

        // offered once, on the miss
        assert_eq!(registry.known(), vec!["test.node1".to_string()]);

        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        assert_eq!(first.permission, "test.node1");
        assert_eq!(second.result.result(), Tristate::True);
        assert!(receiver.try_recv().is_err());
    }
}
