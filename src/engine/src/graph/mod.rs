//! Graph traversal over holder inheritance
//!
//! [`traversal`] holds the generic algorithms; [`inheritance`] adapts them
//! to users and groups.

pub mod inheritance;
pub mod traversal;

pub use inheritance::InheritanceGraph;
pub use traversal::{Graph, Traversal, TraversalAlgorithm};
