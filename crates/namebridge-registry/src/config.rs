//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Revoke every grant on a resource when its name is re-registered
    /// after expiry. When false the previous registrant's grants persist.
    pub clear_roles_on_reregister: bool,

    /// Timestamp the block clock starts at.
    pub genesis_timestamp: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            clear_roles_on_reregister: true,
            genesis_timestamp: 0,
        }
    }
}
