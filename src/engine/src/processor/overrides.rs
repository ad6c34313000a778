//! Override processors
//!
//! Overrides sit at the end of the chain. They fill in results nothing else
//! defined (platform defaults, for example) and, when configured, replace
//! results that came from a wildcard grammar.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use permweave_core::Tristate;

use crate::calculator::TristateResult;
use crate::error::Result;

use super::ProcessorKind;

/// Supplies override values for permissions
pub trait OverrideSource: Send + Sync {
    /// Name used to tag results produced by this source
    fn name(&self) -> &str;

    /// Override value for a lowercased permission; `Undefined` leaves the result alone
    fn check(&self, permission: &str) -> Result<Tristate>;

    /// Drops any state derived from the holder's nodes
    fn invalidate(&self) {}
}

/// Fixed table of default values
#[derive(Debug, Clone, Default)]
pub struct DefaultsOverride {
    name: String,
    defaults: HashMap<String, bool>,
}

impl DefaultsOverride {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: HashMap::new(),
        }
    }

    pub fn with_default(mut self, permission: &str, value: bool) -> Self {
        self.defaults.insert(permission.to_lowercase(), value);
        self
    }
}

impl OverrideSource for DefaultsOverride {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, permission: &str) -> Result<Tristate> {
        Ok(self.defaults.get(permission).copied().into())
    }
}

/// Override backed by a closure
pub struct FnOverride<F> {
    name: String,
    check: F,
}

impl<F> FnOverride<F>
where
    F: Fn(&str) -> Result<Tristate> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> OverrideSource for FnOverride<F>
where
    F: Fn(&str) -> Result<Tristate> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, permission: &str) -> Result<Tristate> {
        (self.check)(permission)
    }
}

/// Chain stage wrapping an [`OverrideSource`]
pub struct OverrideProcessor {
    source: Arc<dyn OverrideSource>,
    kind: ProcessorKind,
    override_wildcards: bool,
}

impl OverrideProcessor {
    /// # Arguments
    ///
    /// * `source` - Where override values come from
    /// * `override_wildcards` - Also replace results produced by wildcard,
    ///   legacy child or regex processors
    pub fn new(source: Arc<dyn OverrideSource>, override_wildcards: bool) -> Self {
        let kind = ProcessorKind::override_named(source.name());
        Self {
            source,
            kind,
            override_wildcards,
        }
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind.clone()
    }

    pub fn evaluate(&self, prev: &TristateResult, permission: &str) -> Result<Option<TristateResult>> {
        if prev.is_defined() {
            let replaceable = self.override_wildcards
                && prev.processor().map_or(false, ProcessorKind::is_wildcard_grammar);
            if !replaceable {
                return Ok(None);
            }
        }

        let value = self.source.check(permission)?;
        if !value.is_defined() {
            return Ok(None);
        }

        let result = TristateResult::of(value, None, self.kind.clone());
        if prev.is_defined() {
            Ok(Some(result.overriding(prev.clone())))
        } else {
            Ok(Some(result))
        }
    }

    pub fn invalidate(&self) {
        self.source.invalidate();
    }
}

impl fmt::Debug for OverrideProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideProcessor")
            .field("kind", &self.kind)
            .field("override_wildcards", &self.override_wildcards)
            .finish()
    }
}
