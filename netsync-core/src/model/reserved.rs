//! Networks the synchronizer must never touch.

use std::collections::HashSet;

/// Controller-managed networks that share the namespace with synced ones.
pub const DEFAULT_RESERVED_NETWORKS: &[&str] = &[
    "__link_local__",
    "ip-fabric",
    "default-virtual-network",
    "public",
];

/// Set of network names excluded from both snapshots before diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_NETWORKS.iter().copied())
    }
}

impl ReservedNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
