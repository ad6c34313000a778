//! Holder model: users, groups and their node layers

pub mod group;
pub mod holder;
pub mod manager;
pub mod node_map;
pub mod user;

pub use group::Group;
pub use holder::{Holder, HolderNodes, StateListener};
pub use manager::{GroupManager, GroupSource};
pub use node_map::NodeMap;
pub use user::User;
