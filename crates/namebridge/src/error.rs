//! Error types for the ledger.

use namebridge_bridge::{BridgeError, ErrorKind};
use namebridge_core::{Account, TokenId};
use namebridge_registry::RegistryError;
use namebridge_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Bridge error.
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A transfer to the controller carried no payload.
    #[error("transfer of {0} to the controller needs transfer data")]
    MissingTransferData(TokenId),

    /// A renewed name names an observer this ledger cannot call.
    #[error("unknown token observer: {0}")]
    UnknownObserver(Account),
}

impl LedgerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Registry(e) => ErrorKind::of_registry(e),
            LedgerError::Bridge(e) => e.kind(),
            LedgerError::Store(_) => ErrorKind::Internal,
            LedgerError::MissingTransferData(_) | LedgerError::UnknownObserver(_) => {
                ErrorKind::PreconditionFailed
            }
        }
    }

    /// The bridge error underneath, if any.
    pub fn as_bridge(&self) -> Option<&BridgeError> {
        match self {
            LedgerError::Bridge(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
