//! Events emitted by the registry and bridge controllers.
//!
//! Events are appended to the datastore's log inside the same atomic step as
//! the mutation that produced them, so a rolled-back operation leaves no trace.

use serde::{Deserialize, Serialize};

use crate::entry::{ResolverSlot, TokenObserver};
use crate::roles::RoleBitmap;
use crate::types::{Account, ResourceId, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    NameRegistered {
        token_id: TokenId,
        label: String,
        owner: Account,
        expiry: u64,
    },
    NameRenewed {
        token_id: TokenId,
        expiry: u64,
        renewed_by: Account,
    },
    NameBurned {
        token_id: TokenId,
        burned_by: Account,
    },
    Transfer {
        token_id: TokenId,
        from: Account,
        to: Account,
    },
    SubregistryUpdated {
        token_id: TokenId,
        subregistry: Option<Account>,
    },
    ResolverUpdated {
        token_id: TokenId,
        resolver: ResolverSlot,
    },
    TokenObserverUpdated {
        token_id: TokenId,
        observer: TokenObserver,
    },
    RolesGranted {
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
        granted_by: Account,
    },
    RolesRevoked {
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
        revoked_by: Account,
    },
    ApprovalForAll {
        owner: Account,
        operator: Account,
        approved: bool,
    },
    /// A name left this ledger's control and is in flight.
    EjectionInitiated {
        token_id: TokenId,
        label: String,
        owner: Account,
    },
    /// An inbound name was restored and handed to its owner.
    InjectionCompleted {
        token_id: TokenId,
        label: String,
        owner: Account,
    },
    /// A renewal relayed from the other ledger was applied.
    RenewalSynced {
        token_id: TokenId,
        expiry: u64,
    },
}

impl Event {
    /// The token an event refers to, if any.
    pub fn token_id(&self) -> Option<TokenId> {
        match self {
            Event::NameRegistered { token_id, .. }
            | Event::NameRenewed { token_id, .. }
            | Event::NameBurned { token_id, .. }
            | Event::Transfer { token_id, .. }
            | Event::SubregistryUpdated { token_id, .. }
            | Event::ResolverUpdated { token_id, .. }
            | Event::TokenObserverUpdated { token_id, .. }
            | Event::EjectionInitiated { token_id, .. }
            | Event::InjectionCompleted { token_id, .. }
            | Event::RenewalSynced { token_id, .. } => Some(*token_id),
            Event::RolesGranted { .. }
            | Event::RolesRevoked { .. }
            | Event::ApprovalForAll { .. } => None,
        }
    }
}
