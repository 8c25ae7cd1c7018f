//! Error types for namebridge core.

use thiserror::Error;

/// Errors from identifier and label handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for CoreError {
    fn from(e: hex::FromHexError) -> Self {
        CoreError::InvalidHex(e.to_string())
    }
}
