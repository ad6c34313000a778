//! Registry of permission strings seen by calculators
//!
//! Tooling such as tab-completion or permission tree views reads it. The
//! calculator only ever offers strings to it.

use dashmap::DashSet;

/// Receives every permission string a calculator computes for the first time
pub trait PermissionRegistry: Send + Sync {
    /// Records a lowercased permission; must not block
    fn offer(&self, permission: &str);
}

/// In-memory registry
#[derive(Debug, Default)]
pub struct InMemoryPermissionRegistry {
    known: DashSet<String>,
}

impl InMemoryPermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.known.contains(permission)
    }

    /// Known permissions, sorted
    pub fn known(&self) -> Vec<String> {
        let mut known: Vec<String> = self.known.iter().map(|p| p.key().clone()).collect();
        known.sort();
        known
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl PermissionRegistry for InMemoryPermissionRegistry {
    fn offer(&self, permission: &str) {
        if !self.known.contains(permission) {
            self.known.insert(permission.to_string());
        }
    }
}
