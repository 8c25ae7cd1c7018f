//! Bridge payload describing what the receiving side should materialize.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::RoleBitmap;
use crate::types::{label_of, Account, ResourceId};

/// Snapshot of a name travelling between ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    /// Either a bare label (`"test"`) or a dotted name (`"test.eth"`).
    pub label: String,
    /// Account that receives the name on the other side.
    pub owner: Account,
    pub subregistry: Option<Account>,
    pub resolver: Option<Account>,
    /// Roles granted to `owner` on arrival, masked by the receiver.
    pub role_bitmap: RoleBitmap,
    /// Expiry at the time of ejection (seconds).
    pub expiry: u64,
}

impl TransferData {
    /// Payload for moving `label` to `owner` with no subregistry or resolver.
    pub fn new(label: impl Into<String>, owner: Account) -> Self {
        Self {
            label: label.into(),
            owner,
            subregistry: None,
            resolver: None,
            role_bitmap: RoleBitmap::EMPTY,
            expiry: 0,
        }
    }

    pub fn with_subregistry(mut self, subregistry: Account) -> Self {
        self.subregistry = Some(subregistry);
        self
    }

    pub fn with_resolver(mut self, resolver: Account) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_roles(mut self, roles: RoleBitmap) -> Self {
        self.role_bitmap = roles;
        self
    }

    pub fn with_expiry(mut self, expiry: u64) -> Self {
        self.expiry = expiry;
        self
    }

    /// The normalized leftmost label.
    pub fn normalized_label(&self) -> Result<String, CoreError> {
        label_of(&self.label)
    }

    /// The resource this payload refers to.
    pub fn resource(&self) -> Result<ResourceId, CoreError> {
        ResourceId::from_label(&self.normalized_label()?)
    }
}
