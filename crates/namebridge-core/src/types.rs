//! Strong type definitions for namebridge.
//!
//! All identifiers are newtypes to prevent misuse at compile time. A name is
//! addressed three ways:
//!
//! - [`LabelHash`]: Blake3 of the normalized label.
//! - [`ResourceId`]: the label hash with its low 4 bytes cleared. Role grants
//!   are keyed by resource and survive re-registration.
//! - [`TokenId`]: the resource id with the token version in the low 4 bytes.
//!   The version increments whenever the name is re-registered after expiry,
//!   which invalidates the previous ownership record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Maximum length of a single label in bytes.
pub const MAX_LABEL_LEN: usize = 255;

/// Number of trailing bytes of a token id that carry the version.
const VERSION_BYTES: usize = 4;

/// A 20-byte account address on a ledger.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account(pub [u8; 20]);

impl Account {
    /// The zero account (no owner).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create an account from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero account.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Generate a random account.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account(0x{})", self.to_hex())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl TryFrom<&[u8]> for Account {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 20] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Blake3 hash of a normalized label.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelHash(pub [u8; 32]);

impl LabelHash {
    /// Hash a label after normalizing it.
    pub fn of(label: &str) -> Result<Self, CoreError> {
        let normalized = normalize_label(label)?;
        Ok(Self(*blake3::hash(normalized.as_bytes()).as_bytes()))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for LabelHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelHash({})", &self.to_hex()[..16])
    }
}

/// Stable key for a name's permission bitmaps and entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub [u8; 32]);

impl ResourceId {
    /// Registry-wide resource. Grants here apply to every name.
    pub const ROOT: Self = Self([0u8; 32]);

    /// Create from raw bytes, clearing the version bytes.
    pub fn from_bytes(mut bytes: [u8; 32]) -> Self {
        bytes[32 - VERSION_BYTES..].fill(0);
        Self(bytes)
    }

    /// Derive the resource for a label.
    pub fn from_label(label: &str) -> Result<Self, CoreError> {
        Ok(Self::from(LabelHash::of(label)?))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the registry-wide root resource.
    pub fn is_root(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<LabelHash> for ResourceId {
    fn from(hash: LabelHash) -> Self {
        Self::from_bytes(hash.0)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Externally visible ownership token: resource id plus version counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub [u8; 32]);

impl TokenId {
    /// Combine a resource with a token version.
    pub fn new(resource: ResourceId, version: u32) -> Self {
        let mut bytes = resource.0;
        bytes[32 - VERSION_BYTES..].copy_from_slice(&version.to_be_bytes());
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The resource this token is bound to.
    pub fn resource(&self) -> ResourceId {
        ResourceId::from_bytes(self.0)
    }

    /// The token version.
    pub fn version(&self) -> u32 {
        let mut buf = [0u8; VERSION_BYTES];
        buf.copy_from_slice(&self.0[32 - VERSION_BYTES..]);
        u32::from_be_bytes(buf)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}@v{})", &self.to_hex()[..16], self.version())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", &self.to_hex()[..16], self.version())
    }
}

impl TryFrom<&[u8]> for TokenId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Normalize a single label: ASCII-lowercase, non-empty, no dots, bounded length.
pub fn normalize_label(label: &str) -> Result<String, CoreError> {
    if label.is_empty() {
        return Err(CoreError::InvalidLabel("empty label".into()));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(CoreError::InvalidLabel(format!(
            "label exceeds {} bytes",
            MAX_LABEL_LEN
        )));
    }
    if label.contains('.') {
        return Err(CoreError::InvalidLabel(format!("'{}' contains a dot", label)));
    }
    if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::InvalidLabel(format!(
            "'{}' contains whitespace or control characters",
            label
        )));
    }
    Ok(label.to_ascii_lowercase())
}

/// Extract the leftmost label from either a bare label or a dotted name.
///
/// `"test"` and `"test.eth"` both yield `"test"`.
pub fn label_of(label_or_name: &str) -> Result<String, CoreError> {
    let first = label_or_name.split('.').next().unwrap_or_default();
    normalize_label(first)
}
