//! Identity of a permission holder

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a user (by uuid) or a group (by lowercase name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum HolderId {
    User(Uuid),
    Group(String),
}

impl HolderId {
    /// Group identifier with a normalized name
    pub fn group(name: &str) -> Self {
        HolderId::Group(name.trim().to_lowercase())
    }

    pub fn user(uuid: Uuid) -> Self {
        HolderId::User(uuid)
    }

    pub fn is_user(&self) -> bool {
        matches!(self, HolderId::User(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, HolderId::Group(_))
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderId::User(uuid) => write!(f, "user:{}", uuid),
            HolderId::Group(name) => write!(f, "group:{}", name),
        }
    }
}
