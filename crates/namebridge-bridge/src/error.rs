//! Error types for the bridge.

use thiserror::Error;

use namebridge_core::{Account, RoleBitmap, TokenId};
use namebridge_registry::RegistryError;
use namebridge_store::StoreError;

/// Wire decoding failures. Never retried; the message is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u64),

    #[error("unknown message type: {0}")]
    UnknownType(u64),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("non-canonical encoding")]
    NonCanonical,

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Broad classes of bridge failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller lacks a role.
    PermissionDenied,
    /// A uniqueness invariant on roles does not hold.
    InvariantViolation,
    /// State does not allow the operation right now.
    PreconditionFailed,
    /// This controller does not support the operation in its direction.
    UnsupportedOperation,
    /// A message could not be decoded.
    TransportDecode,
    /// Storage or transport plumbing failed.
    Internal,
}

/// Errors that can occur during bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} does not hold the ejector role")]
    NotEjector(Account),

    #[error("{0} is not the registry")]
    NotRegistry(Account),

    #[error("{0} is not the controller admin")]
    NotAdmin(Account),

    /// A critical role has zero or several holders.
    #[error("too many role assignees on {token_id}: {roles}")]
    TooManyRoleAssignees { token_id: TokenId, roles: RoleBitmap },

    /// The controller does not hold the token it was asked to release.
    #[error("controller does not own {0}")]
    NotTokenOwner(TokenId),

    #[error("invalid owner: zero account")]
    InvalidOwner,

    /// The payload's label does not match the token, or is not a label.
    #[error("invalid label '{label}'")]
    InvalidLabel {
        label: String,
        token_id: Option<TokenId>,
    },

    /// A renewal arrived for a name this ledger has no entry for.
    #[error("unknown token: {0}")]
    UnknownToken(TokenId),

    #[error("renewal not supported for {0}")]
    RenewalNotSupported(TokenId),

    #[error("decode error: {0}")]
    Decode(#[from] MessageError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl BridgeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotEjector(_) | BridgeError::NotRegistry(_) | BridgeError::NotAdmin(_) => {
                ErrorKind::PermissionDenied
            }
            BridgeError::TooManyRoleAssignees { .. } => ErrorKind::InvariantViolation,
            BridgeError::NotTokenOwner(_)
            | BridgeError::InvalidOwner
            | BridgeError::InvalidLabel { .. }
            | BridgeError::UnknownToken(_) => ErrorKind::PreconditionFailed,
            BridgeError::RenewalNotSupported(_) => ErrorKind::UnsupportedOperation,
            BridgeError::Decode(_) => ErrorKind::TransportDecode,
            BridgeError::Transport(_) => ErrorKind::Internal,
            BridgeError::Registry(e) => ErrorKind::of_registry(e),
        }
    }
}

impl ErrorKind {
    /// Classify a registry failure.
    pub fn of_registry(error: &RegistryError) -> Self {
        match error {
            RegistryError::Unauthorized { .. } | RegistryError::NotOwnerOrOperator { .. } => {
                ErrorKind::PermissionDenied
            }
            RegistryError::Store(_) => ErrorKind::Internal,
            _ => ErrorKind::PreconditionFailed,
        }
    }
}

impl From<StoreError> for BridgeError {
    fn from(e: StoreError) -> Self {
        BridgeError::Registry(RegistryError::Store(e))
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
