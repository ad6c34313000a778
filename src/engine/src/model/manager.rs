//! Loaded group registry

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::group::Group;

/// Looks up loaded groups by name
///
/// This is the seam to whatever loads groups from storage. A group that is
/// not loaded is treated as missing.
pub trait GroupSource: Send + Sync {
    fn get_if_loaded(&self, name: &str) -> Option<Arc<Group>>;
}

/// In-memory group registry
#[derive(Debug, Default)]
pub struct GroupManager {
    groups: DashMap<String, Arc<Group>>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the loaded group, creating an empty one if needed
    pub fn get_or_create(&self, name: &str) -> Arc<Group> {
        let name = name.trim().to_lowercase();
        Arc::clone(
            self.groups
                .entry(name.clone())
                .or_insert_with(|| {
                    debug!("Loading group {}", name);
                    Arc::new(Group::new(&name))
                })
                .value(),
        )
    }

    pub fn unload(&self, name: &str) -> Option<Arc<Group>> {
        self.groups
            .remove(&name.trim().to_lowercase())
            .map(|(_, group)| group)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.groups.contains_key(&name.trim().to_lowercase())
    }

    /// Every loaded group, in no particular order
    pub fn all(&self) -> Vec<Arc<Group>> {
        self.groups.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl GroupSource for GroupManager {
    fn get_if_loaded(&self, name: &str) -> Option<Arc<Group>> {
        self.groups
            .get(&name.trim().to_lowercase())
            .map(|group| Arc::clone(group.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let manager = GroupManager::new();
        let a = manager.get_or_create("Admin");
        let b = manager.get_or_create("admin");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.len(), 1);
        assert!(manager.get_if_loaded("ADMIN").is_some());
    }

    #[test]
    fn test_unload() {
        let manager = GroupManager::new();
        manager.get_or_create("mod");
        assert!(manager.unload("mod").is_some());
        assert!(!manager.is_loaded("mod"));
        assert!(manager.get_if_loaded("mod").is_none());
    }
}
