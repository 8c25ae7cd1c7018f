//! Bridge message codec.
//!
//! Every message is a single CBOR array:
//!
//! ```text
//! Ejection: [version, 0, label, owner, subregistry|null, resolver|null, roles, expiry]
//! Renewal:  [version, 1, token_id, expiry]
//! ```
//!
//! Accounts are 20-byte strings, token ids 32-byte strings, integers are
//! unsigned. Decoding checks the version, then the tag, and only then reads
//! the fields of that one variant. Anything else is rejected: unknown tags,
//! missing or extra fields, trailing bytes, and encodings that do not
//! re-encode to the same bytes.

use std::io::Cursor;
use std::vec::IntoIter;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use namebridge_core::{Account, CoreError, ResourceId, RoleBitmap, TokenId, TransferData};

use crate::error::MessageError;

/// Current wire version.
pub const WIRE_VERSION: u8 = 1;

/// Type tags.
pub mod tags {
    pub const EJECTION: u64 = 0;
    pub const RENEWAL: u64 = 1;
}

/// Messages exchanged between the two controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeMessage {
    /// A name leaving the sender's ledger.
    Ejection(TransferData),
    /// An expiry extension on the sender's ledger.
    Renewal { token_id: TokenId, expiry: u64 },
}

/// Discriminant of a [`BridgeMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Ejection,
    Renewal,
}

impl BridgeMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            BridgeMessage::Ejection(_) => MessageKind::Ejection,
            BridgeMessage::Renewal { .. } => MessageKind::Renewal,
        }
    }

    /// The resource the message is about.
    pub fn resource(&self) -> Result<ResourceId, CoreError> {
        match self {
            BridgeMessage::Ejection(data) => data.resource(),
            BridgeMessage::Renewal { token_id, .. } => Ok(token_id.resource()),
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        let mut buf = Vec::new();
        ciborium::into_writer(&self.to_value(), &mut buf)
            .map_err(|e| MessageError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let value: Value = ciborium::from_reader(Cursor::new(bytes))
            .map_err(|e| MessageError::Malformed(e.to_string()))?;

        // Re-encode to learn how many bytes the value occupied.
        let mut canonical = Vec::with_capacity(bytes.len());
        ciborium::into_writer(&value, &mut canonical)
            .map_err(|e| MessageError::Malformed(e.to_string()))?;
        if bytes.len() > canonical.len() && bytes.starts_with(&canonical) {
            return Err(MessageError::TrailingBytes(bytes.len() - canonical.len()));
        }
        if canonical != bytes {
            return Err(MessageError::NonCanonical);
        }

        let items = match value {
            Value::Array(items) => items,
            _ => return Err(MessageError::Malformed("expected array".into())),
        };
        let mut fields = items.into_iter();

        let version = take_uint(&mut fields, "version")?;
        if version != u64::from(WIRE_VERSION) {
            return Err(MessageError::UnsupportedVersion(version));
        }

        let message = match take_uint(&mut fields, "tag")? {
            tags::EJECTION => BridgeMessage::Ejection(TransferData {
                label: take_text(&mut fields, "label")?,
                owner: take_account(&mut fields, "owner")?,
                subregistry: take_optional_account(&mut fields, "subregistry")?,
                resolver: take_optional_account(&mut fields, "resolver")?,
                role_bitmap: RoleBitmap(take_u32(&mut fields, "roles")?),
                expiry: take_uint(&mut fields, "expiry")?,
            }),
            tags::RENEWAL => BridgeMessage::Renewal {
                token_id: take_token_id(&mut fields, "token_id")?,
                expiry: take_uint(&mut fields, "expiry")?,
            },
            other => return Err(MessageError::UnknownType(other)),
        };

        if fields.next().is_some() {
            return Err(MessageError::Malformed("unexpected extra fields".into()));
        }
        Ok(message)
    }

    fn to_value(&self) -> Value {
        let mut items = vec![Value::Integer(WIRE_VERSION.into())];
        match self {
            BridgeMessage::Ejection(data) => {
                items.push(Value::Integer(tags::EJECTION.into()));
                items.push(Value::Text(data.label.clone()));
                items.push(Value::Bytes(data.owner.as_bytes().to_vec()));
                items.push(optional_account(data.subregistry));
                items.push(optional_account(data.resolver));
                items.push(Value::Integer(data.role_bitmap.bits().into()));
                items.push(Value::Integer(data.expiry.into()));
            }
            BridgeMessage::Renewal { token_id, expiry } => {
                items.push(Value::Integer(tags::RENEWAL.into()));
                items.push(Value::Bytes(token_id.as_bytes().to_vec()));
                items.push(Value::Integer((*expiry).into()));
            }
        }
        Value::Array(items)
    }
}

fn optional_account(account: Option<Account>) -> Value {
    match account {
        Some(account) => Value::Bytes(account.as_bytes().to_vec()),
        None => Value::Null,
    }
}

fn take(fields: &mut IntoIter<Value>, name: &str) -> Result<Value, MessageError> {
    fields
        .next()
        .ok_or_else(|| MessageError::Malformed(format!("missing field: {}", name)))
}

fn take_uint(fields: &mut IntoIter<Value>, name: &str) -> Result<u64, MessageError> {
    match take(fields, name)? {
        Value::Integer(i) => u64::try_from(i)
            .map_err(|_| MessageError::Malformed(format!("{} out of range", name))),
        _ => Err(MessageError::Malformed(format!("{} must be an integer", name))),
    }
}

fn take_u32(fields: &mut IntoIter<Value>, name: &str) -> Result<u32, MessageError> {
    u32::try_from(take_uint(fields, name)?)
        .map_err(|_| MessageError::Malformed(format!("{} out of range", name)))
}

fn take_text(fields: &mut IntoIter<Value>, name: &str) -> Result<String, MessageError> {
    match take(fields, name)? {
        Value::Text(s) => Ok(s),
        _ => Err(MessageError::Malformed(format!("{} must be text", name))),
    }
}

fn account_from(value: Value, name: &str) -> Result<Account, MessageError> {
    match value {
        Value::Bytes(b) => Account::try_from(b.as_slice())
            .map_err(|_| MessageError::Malformed(format!("{} must be 20 bytes", name))),
        _ => Err(MessageError::Malformed(format!("{} must be bytes", name))),
    }
}

fn take_account(fields: &mut IntoIter<Value>, name: &str) -> Result<Account, MessageError> {
    account_from(take(fields, name)?, name)
}

fn take_optional_account(
    fields: &mut IntoIter<Value>,
    name: &str,
) -> Result<Option<Account>, MessageError> {
    match take(fields, name)? {
        Value::Null => Ok(None),
        value => account_from(value, name).map(Some),
    }
}

fn take_token_id(fields: &mut IntoIter<Value>, name: &str) -> Result<TokenId, MessageError> {
    match take(fields, name)? {
        Value::Bytes(b) => TokenId::try_from(b.as_slice())
            .map_err(|_| MessageError::Malformed(format!("{} must be 32 bytes", name))),
        _ => Err(MessageError::Malformed(format!("{} must be bytes", name))),
    }
}
