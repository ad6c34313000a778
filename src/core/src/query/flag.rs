//! Behaviour toggles carried by [`QueryOptions`](super::QueryOptions)

use serde::{Deserialize, Serialize};

/// A boolean toggle on a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Follow inheritance nodes into parent groups
    ResolveInheritance,
    /// Keep non-inheritance nodes that carry no `server` context
    IncludeNodesWithoutServerContext,
    /// Keep non-inheritance nodes that carry no `world` context
    IncludeNodesWithoutWorldContext,
    /// Apply inheritance nodes that carry no `server` context
    ApplyInheritanceNodesWithoutServerContext,
    /// Apply inheritance nodes that carry no `world` context
    ApplyInheritanceNodesWithoutWorldContext,
}

impl Flag {
    pub const ALL: [Flag; 5] = [
        Flag::ResolveInheritance,
        Flag::IncludeNodesWithoutServerContext,
        Flag::IncludeNodesWithoutWorldContext,
        Flag::ApplyInheritanceNodesWithoutServerContext,
        Flag::ApplyInheritanceNodesWithoutWorldContext,
    ];

    pub(crate) fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Compact set of flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSet(u8);

impl FlagSet {
    pub fn none() -> Self {
        FlagSet(0)
    }

    pub fn all() -> Self {
        Flag::ALL.iter().fold(FlagSet::none(), |set, flag| set.with(*flag, true))
    }

    pub fn contains(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn with(self, flag: Flag, on: bool) -> Self {
        if on {
            FlagSet(self.0 | flag.bit())
        } else {
            FlagSet(self.0 & !flag.bit())
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |flag| self.contains(*flag))
    }
}

impl Default for FlagSet {
    fn default() -> Self {
        FlagSet::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_holds_every_flag() {
        let flags = FlagSet::default();
        assert_eq!(flags.iter().count(), Flag::ALL.len());
    }

    #[test]
    fn test_toggle() {
        let flags = FlagSet::all().with(Flag::ResolveInheritance, false);
        assert!(!flags.contains(Flag::ResolveInheritance));
        assert!(flags.contains(Flag::IncludeNodesWithoutWorldContext));
        assert!(flags.with(Flag::ResolveInheritance, true).contains(Flag::ResolveInheritance));
    }
}
