//! # Permweave Core
//!
//! Value types shared by the permweave crates: context sets, permission
//! nodes, tristate results, holder identities and query options.

pub mod context;
pub mod error;
pub mod holder_id;
pub mod node;
pub mod query;
pub mod telemetry;
pub mod tristate;

// Re-export commonly used types
pub use context::{ContextSatisfyMode, ImmutableContextSet};
pub use error::{CoreError, Result};
pub use holder_id::HolderId;
pub use node::{Node, NodeBuilder, NodeKind};
pub use query::{DataSelector, DataType, Flag, QueryMode, QueryOptions};
pub use tristate::Tristate;
