//! Engine configuration loading and validation

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::graph::TraversalAlgorithm;
use crate::primary_group::PrimaryGroupCalculation;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub processors: ProcessorSection,

    #[serde(default)]
    pub inheritance: InheritanceSection,

    #[serde(default)]
    pub primary_group: PrimaryGroupSection,

    /// Fallback weights keyed by lowercase group name
    #[serde(default)]
    pub group_weights: HashMap<String, i32>,

    #[serde(default)]
    pub refresh: RefreshSection,

    #[serde(default)]
    pub diagnostics: DiagnosticsSection,
}

/// Which processors make up a calculator's chain
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessorSection {
    #[serde(default = "default_true")]
    pub apply_wildcards: bool,
    #[serde(default = "default_true")]
    pub apply_regex: bool,
    #[serde(default)]
    pub apply_sponge_implicit_wildcards: bool,
    /// Let override processors replace results produced by wildcard grammars
    #[serde(default = "default_true")]
    pub override_wildcards: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InheritanceSection {
    #[serde(default)]
    pub traversal_algorithm: TraversalAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrimaryGroupSection {
    #[serde(default)]
    pub calculation: PrimaryGroupCalculation,
    #[serde(default = "default_group")]
    pub default_group: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RefreshSection {
    /// Debounce window of the recalculation buffer
    #[serde(default = "default_buffer_millis")]
    pub buffer_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DiagnosticsSection {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_true() -> bool { true }
fn default_group() -> String { "default".to_string() }
fn default_cache_ttl() -> u64 { 60 }
fn default_buffer_millis() -> u64 { 500 }
fn default_channel_capacity() -> usize { 4096 }

impl Default for ProcessorSection {
    fn default() -> Self {
        Self {
            apply_wildcards: true,
            apply_regex: true,
            apply_sponge_implicit_wildcards: false,
            override_wildcards: true,
        }
    }
}

impl Default for PrimaryGroupSection {
    fn default() -> Self {
        Self {
            calculation: PrimaryGroupCalculation::default(),
            default_group: default_group(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            buffer_millis: default_buffer_millis(),
        }
    }
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl PrimaryGroupSection {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl RefreshSection {
    pub fn buffer_window(&self) -> Duration {
        Duration::from_millis(self.buffer_millis)
    }
}

impl EngineConfig {
    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: EngineConfig = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.primary_group.default_group.trim().is_empty() {
            return Err(EngineError::Config("default group must not be empty".into()));
        }

        if self.primary_group.cache_ttl_secs == 0 {
            return Err(EngineError::Config("primary group cache TTL must be positive".into()));
        }

        if self.diagnostics.channel_capacity == 0 {
            return Err(EngineError::Config("diagnostics channel capacity must be positive".into()));
        }

        Ok(())
    }

    /// Configured weight for a group, if any
    pub fn group_weight(&self, group: &str) -> Option<i32> {
        self.group_weights.get(&group.to_lowercase()).copied()
    }

    fn normalize(&mut self) {
        self.primary_group.default_group = self.primary_group.default_group.trim().to_lowercase();
        self.group_weights = self
            .group_weights
            .drain()
            .map(|(name, weight)| (name.trim().to_lowercase(), weight))
            .collect();
    }
}
