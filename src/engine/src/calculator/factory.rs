//! Builds calculators from the processor configuration

use std::sync::Arc;

use tracing::debug;

use crate::config::ProcessorSection;
use crate::processor::{
    DirectProcessor, LegacyChildWildcardProcessor, OverrideProcessor, OverrideSource, Processor,
    RegexProcessor, WildcardProcessor,
};

use super::{CalculatorMetadata, DiagnosticsSink, PermissionCalculator, PermissionRegistry};

/// Assembles processor chains
///
/// Chain order: direct, regex, wildcard, legacy child wildcard, then each
/// registered override source in registration order.
#[derive(Clone)]
pub struct CalculatorFactory {
    config: ProcessorSection,
    overrides: Vec<Arc<dyn OverrideSource>>,
    registry: Option<Arc<dyn PermissionRegistry>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl CalculatorFactory {
    pub fn new(config: ProcessorSection) -> Self {
        Self {
            config,
            overrides: Vec::new(),
            registry: None,
            diagnostics: None,
        }
    }

    pub fn with_override(mut self, source: Arc<dyn OverrideSource>) -> Self {
        self.overrides.push(source);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn PermissionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn config(&self) -> &ProcessorSection {
        &self.config
    }

    /// Builds a calculator with an empty source map
    pub fn build(&self, metadata: CalculatorMetadata) -> PermissionCalculator {
        let mut processors = vec![Processor::Direct(DirectProcessor)];

        if self.config.apply_regex {
            processors.push(Processor::Regex(RegexProcessor::new()));
        }
        if self.config.apply_wildcards {
            processors.push(Processor::Wildcard(WildcardProcessor::new()));
        }
        if self.config.apply_sponge_implicit_wildcards {
            processors.push(Processor::LegacyChildWildcard(LegacyChildWildcardProcessor::new()));
        }
        for source in &self.overrides {
            processors.push(Processor::Override(OverrideProcessor::new(
                Arc::clone(source),
                self.config.override_wildcards,
            )));
        }

        debug!(
            "Building calculator for {} with {} processors",
            metadata.holder,
            processors.len()
        );

        let mut calculator = PermissionCalculator::new(metadata, processors);
        if let Some(registry) = &self.registry {
            calculator = calculator.with_registry(Arc::clone(registry));
        }
        if let Some(diagnostics) = &self.diagnostics {
            calculator = calculator.with_diagnostics(Arc::clone(diagnostics));
        }
        calculator
    }
}

impl std::fmt::Debug for CalculatorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorFactory")
            .field("config", &self.config)
            .field("overrides", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{DefaultsOverride, ProcessorKind};
    use permweave_core::{HolderId, QueryOptions};

    fn metadata() -> CalculatorMetadata {
        CalculatorMetadata::new(HolderId::group("default"), QueryOptions::non_contextual())
    }

    #[test]
    fn test_default_chain() {
        let factory = CalculatorFactory::new(ProcessorSection::default());
        assert_eq!(
            factory.build(metadata()).processor_kinds(),
            vec![ProcessorKind::Direct, ProcessorKind::Regex, ProcessorKind::Wildcard]
        );
    }

    #[test]
    fn test_configured_chain() {
        let config = ProcessorSection {
            apply_wildcards: false,
            apply_regex: false,
            apply_sponge_implicit_wildcards: true,
            override_wildcards: true,
        };
        let factory = CalculatorFactory::new(config)
            .with_override(Arc::new(DefaultsOverride::new("defaults")));

        assert_eq!(
            factory.build(metadata()).processor_kinds(),
            vec![
                ProcessorKind::Direct,
                ProcessorKind::LegacyChildWildcard,
                ProcessorKind::override_named("defaults"),
            ]
        );
    }
}
