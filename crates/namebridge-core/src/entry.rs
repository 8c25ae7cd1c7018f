//! Name records held by the registry.

use serde::{Deserialize, Serialize};

use crate::types::{Account, ResourceId, TokenId};

/// State of an entry's resolver slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolverSlot {
    /// No resolver configured.
    #[default]
    Unset,
    /// A resolver contract on this ledger.
    Set(Account),
    /// The name is held by a bridge controller while a cross-chain message
    /// is in flight. Never settable through the registry's public setter.
    InFlight,
}

impl ResolverSlot {
    /// Build a slot from an optional resolver reference.
    pub fn from_ref(resolver: Option<Account>) -> Self {
        match resolver {
            Some(account) if !account.is_zero() => ResolverSlot::Set(account),
            _ => ResolverSlot::Unset,
        }
    }

    /// The resolver account, if one is set.
    pub fn account(&self) -> Option<Account> {
        match self {
            ResolverSlot::Set(account) => Some(*account),
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, ResolverSlot::InFlight)
    }
}

/// Who the registry notifies when a name is renewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenObserver {
    #[default]
    None,
    /// A bridge controller relaying renewals across ledgers.
    Controller(Account),
}

impl TokenObserver {
    pub fn account(&self) -> Option<Account> {
        match self {
            TokenObserver::None => None,
            TokenObserver::Controller(account) => Some(*account),
        }
    }
}

/// A name record, keyed by [`ResourceId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The normalized label this entry was registered under.
    pub label: String,
    /// Current token version; bumps on re-registration after expiry.
    pub token_version: u32,
    /// Owner of the current token.
    pub owner: Account,
    /// Child registry for this name, if any.
    pub subregistry: Option<Account>,
    pub resolver: ResolverSlot,
    pub observer: TokenObserver,
    /// Expiry timestamp (seconds).
    pub expiry: u64,
}

impl Entry {
    /// The current token id for this entry.
    pub fn token_id(&self, resource: ResourceId) -> TokenId {
        TokenId::new(resource, self.token_version)
    }

    /// Whether the registration has lapsed at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry <= now
    }
}
