//! # Permweave Engine
//!
//! Permission calculation for users and groups with inheritance.
//!
//! ## Features
//!
//! - **Processor chain**: exact, regex, dot-segment wildcard and legacy
//!   child wildcard grammars, plus pluggable override sources
//! - **Inheritance**: cycle-safe, weight-ordered traversal of group parents
//! - **Primary groups**: stored or derived from inherited groups, cached per query
//! - **Caching**: compute-on-miss, expiring, most-recent and debounced caches
//!   that never publish results computed before an invalidation
//!
//! ## Module Structure
//!
//! ```text
//! engine/
//! ├── cache/          - Concurrent caching primitives
//! ├── processor/      - Permission matching grammars
//! ├── calculator/     - Processor chain and result cache per holder/query
//! ├── model/          - Users, groups and their node layers
//! ├── graph/          - Traversal algorithms and the inheritance graph
//! ├── primary_group   - Primary group strategies
//! ├── resolver        - Merged node sets
//! └── engine          - The facade wiring it all together
//! ```

pub mod cache;
pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod primary_group;
pub mod processor;
pub mod resolver;

pub use calculator::{
    CalculatorFactory, CalculatorMetadata, PermissionCalculator, TristateResult,
};
pub use config::EngineConfig;
pub use engine::{EngineBuilder, PermissionEngine};
pub use error::{EngineError, Result};
pub use graph::{InheritanceGraph, TraversalAlgorithm};
pub use model::{Group, GroupManager, GroupSource, Holder, User};
pub use primary_group::{PrimaryGroupCalculation, PrimaryGroupResolver};
pub use processor::{OverrideSource, ProcessorKind};
pub use resolver::NodeResolver;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
