//! Node storage shared by users and groups
//!
//! Each holder keeps a normal and a transient [`NodeMap`]. Edits are
//! copy-on-write: a writer clones the current map, modifies the clone and
//! swaps it in, so readers holding the previous `Arc` are never disturbed.

use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use permweave_core::{DataSelector, DataType, HolderId, ImmutableContextSet, Node, QueryOptions};

use super::group::Group;
use super::node_map::NodeMap;
use super::user::User;

/// Notified after a holder's nodes change
pub trait StateListener: Send + Sync {
    fn on_state_change(&self);
}

/// The two node layers of a holder plus its change listeners
#[derive(Default)]
pub struct HolderNodes {
    normal: RwLock<Arc<NodeMap>>,
    transient: RwLock<Arc<NodeMap>>,
    listeners: Mutex<Vec<Weak<dyn StateListener>>>,
}

impl HolderNodes {
    pub fn new() -> Self {
        Self::default()
    }

    fn layer(&self, data_type: DataType) -> &RwLock<Arc<NodeMap>> {
        match data_type {
            DataType::Normal => &self.normal,
            DataType::Transient => &self.transient,
        }
    }

    /// Current snapshot of a layer
    pub fn nodes(&self, data_type: DataType) -> Arc<NodeMap> {
        Arc::clone(&self.layer(data_type).read())
    }

    /// Registers a listener; it is dropped automatically once its owner is gone
    pub fn subscribe(&self, listener: Weak<dyn StateListener>) {
        self.listeners.lock().push(listener);
    }

    /// Notifies listeners of a change made outside the node maps
    pub fn touch(&self) {
        self.notify();
    }

    fn notify(&self) {
        let listeners: Vec<Arc<dyn StateListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.on_state_change();
        }
    }

    /// Applies `edit` to a copy of the layer; swaps and notifies if it reports a change
    fn mutate<F>(&self, data_type: DataType, edit: F) -> bool
    where
        F: FnOnce(&mut NodeMap) -> bool,
    {
        let changed = {
            let mut layer = self.layer(data_type).write();
            let mut next = NodeMap::clone(&layer);
            let changed = edit(&mut next);
            if changed {
                *layer = Arc::new(next);
            }
            changed
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// Sets a node, replacing any node with the same key and contexts
    pub fn set_node(&self, data_type: DataType, node: Node) -> bool {
        self.mutate(data_type, |map| map.insert(node))
    }

    pub fn unset_node(&self, data_type: DataType, key: &str, contexts: &ImmutableContextSet) -> bool {
        self.mutate(data_type, |map| map.remove(key, contexts).is_some())
    }

    pub fn clear_nodes(&self, data_type: DataType) -> bool {
        self.mutate(data_type, NodeMap::clear)
    }

    /// Replaces a whole layer, as delivered by a storage load
    pub fn replace_nodes(&self, data_type: DataType, nodes: impl IntoIterator<Item = Node>) {
        let replacement = NodeMap::from_nodes(nodes);
        self.mutate(data_type, move |map| {
            *map = replacement;
            true
        });
    }

    /// Removes expired temporary nodes from both layers
    ///
    /// # Returns
    ///
    /// The number of nodes removed.
    pub fn audit_temporary_nodes(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for data_type in [DataType::Normal, DataType::Transient] {
            self.mutate(data_type, |map| {
                let expired = map.remove_if(|node| node.has_expired_at(now));
                removed += expired.len();
                !expired.is_empty()
            });
        }
        if removed > 0 {
            debug!("Removed {} expired temporary nodes", removed);
        }
        removed
    }

    /// Nodes of the selected layers that apply to `options`, in resolution order
    pub fn resolve(&self, holder: &HolderId, options: &QueryOptions) -> Vec<Arc<Node>> {
        let now = Utc::now();
        DataSelector::select_order(options, holder)
            .into_iter()
            .flat_map(|data_type| self.nodes(data_type).filtered(options, now))
            .collect()
    }
}

impl std::fmt::Debug for HolderNodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HolderNodes")
            .field("normal", &self.normal.read().len())
            .field("transient", &self.transient.read().len())
            .finish()
    }
}

/// A user or a group
#[derive(Debug, Clone)]
pub enum Holder {
    User(Arc<User>),
    Group(Arc<Group>),
}

impl Holder {
    pub fn id(&self) -> HolderId {
        match self {
            Holder::User(user) => HolderId::User(user.uuid()),
            Holder::Group(group) => HolderId::Group(group.name().to_string()),
        }
    }

    pub fn nodes(&self) -> &HolderNodes {
        match self {
            Holder::User(user) => user.nodes(),
            Holder::Group(group) => group.nodes(),
        }
    }

    /// The holder's own nodes that apply to `options`
    pub fn own_nodes(&self, options: &QueryOptions) -> Vec<Arc<Node>> {
        self.nodes().resolve(&self.id(), options)
    }

    pub fn as_group(&self) -> Option<&Arc<Group>> {
        match self {
            Holder::Group(group) => Some(group),
            Holder::User(_) => None,
        }
    }
}
