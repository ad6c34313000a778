//! Users

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use uuid::Uuid;

use permweave_core::QueryOptions;

use super::holder::{Holder, HolderNodes, StateListener};
use crate::primary_group::PrimaryGroupResolver;

/// A player or account holding permissions
pub struct User {
    uuid: Uuid,
    username: RwLock<Option<String>>,
    /// Primary group as stored, before any calculation
    primary_group: RwLock<Option<String>>,
    nodes: HolderNodes,
    resolver: Arc<PrimaryGroupResolver>,
}

impl User {
    /// Creates a user whose primary group is computed by `resolver`
    ///
    /// The resolver is subscribed to this user's changes so its cached
    /// results are dropped whenever the user's nodes are edited.
    pub fn new(uuid: Uuid, username: Option<String>, resolver: PrimaryGroupResolver) -> Self {
        let resolver = Arc::new(resolver);
        let nodes = HolderNodes::new();
        let listener: Weak<dyn StateListener> = Arc::downgrade(&resolver) as Weak<dyn StateListener>;
        nodes.subscribe(listener);

        Self {
            uuid,
            username: RwLock::new(username),
            primary_group: RwLock::new(None),
            nodes,
            resolver,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn username(&self) -> Option<String> {
        self.username.read().clone()
    }

    pub fn set_username(&self, username: Option<String>) {
        *self.username.write() = username;
    }

    /// Stored primary group, ignoring blank values
    pub fn stored_primary_group(&self) -> Option<String> {
        self.primary_group
            .read()
            .as_ref()
            .filter(|group| !group.trim().is_empty())
            .cloned()
    }

    pub fn set_stored_primary_group(&self, group: Option<&str>) {
        *self.primary_group.write() = group.map(|g| g.trim().to_lowercase());
        self.nodes.touch();
    }

    pub fn nodes(&self) -> &HolderNodes {
        &self.nodes
    }

    pub fn primary_group_resolver(&self) -> &Arc<PrimaryGroupResolver> {
        &self.resolver
    }

    /// Primary group under `options`; never empty
    pub fn primary_group(self: &Arc<Self>, options: &QueryOptions) -> String {
        self.resolver.resolve(&Holder::User(Arc::clone(self)), options)
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("uuid", &self.uuid)
            .field("username", &*self.username.read())
            .field("primary_group", &*self.primary_group.read())
            .field("nodes", &self.nodes)
            .finish()
    }
}
