//! Error types for the registry.

use thiserror::Error;

use namebridge_core::{Account, CoreError, ResourceId, RoleBitmap, TokenId};
use namebridge_store::StoreError;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The caller lacks a role required by the operation.
    #[error("account {account} lacks roles {roles} on resource {resource}")]
    Unauthorized {
        resource: ResourceId,
        roles: RoleBitmap,
        account: Account,
    },

    /// A live registration already exists for the label.
    #[error("name already registered: {0}")]
    NameAlreadyRegistered(TokenId),

    /// No entry exists for this token, or the token version is stale.
    #[error("token not found: {0}")]
    TokenNotFound(TokenId),

    /// The registration has lapsed.
    #[error("name expired: {0}")]
    NameExpired(TokenId),

    /// A renewal must move expiry strictly forward.
    #[error("cannot reduce expiration of {token_id}: {old} -> {new}")]
    CannotReduceExpiration { token_id: TokenId, old: u64, new: u64 },

    /// A registration must expire in the future.
    #[error("expiry {expiry} is not after current time {now}")]
    CannotSetPastExpiration { expiry: u64, now: u64 },

    /// Owners and role holders must be non-zero accounts.
    #[error("invalid owner: zero account")]
    InvalidOwner,

    /// Tokens cannot be transferred to the zero account.
    #[error("invalid recipient: zero account")]
    InvalidRecipient,

    /// `from` does not own the token.
    #[error("{from} does not own {token_id}")]
    IncorrectOwner { token_id: TokenId, from: Account },

    /// The caller is neither the owner nor an approved operator.
    #[error("{caller} is not owner or operator of {token_id}")]
    NotOwnerOrOperator { token_id: TokenId, caller: Account },

    /// The name has been re-registered so often that its token version
    /// cannot be bumped again.
    #[error("token version exhausted for resource {0}")]
    TokenVersionExhausted(ResourceId),

    /// An account cannot be its own operator.
    #[error("invalid operator: {0}")]
    InvalidOperator(Account),

    /// Label normalization or identifier parsing failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
