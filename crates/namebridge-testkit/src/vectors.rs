//! Golden wire vectors.
//!
//! Both controllers may be upgraded independently, so the encoding of each
//! message type is pinned here byte for byte. [`export_json`] writes the
//! vectors out for implementations in other environments.

use serde::Serialize;

use namebridge_bridge::{BridgeMessage, MessageError};
use namebridge_core::{Account, RoleBitmap, TokenId, TransferData};

/// A golden wire vector.
#[derive(Debug, Clone)]
pub struct WireVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub message: BridgeMessage,
    /// Expected encoding (hex).
    pub expected_hex: String,
}

/// Serializable form of a [`WireVector`].
#[derive(Debug, Serialize)]
struct ExportedVector<'a> {
    name: &'a str,
    kind: String,
    hex: &'a str,
}

/// Get all golden wire vectors.
pub fn all_vectors() -> Vec<WireVector> {
    vec![
        WireVector {
            name: "Ejection with resolver, no subregistry",
            message: BridgeMessage::Ejection(TransferData {
                label: "test".into(),
                owner: Account::from_bytes([0xaa; 20]),
                subregistry: None,
                resolver: Some(Account::from_bytes([0xbb; 20])),
                role_bitmap: RoleBitmap(0x1f),
                expiry: 0,
            }),
            expected_hex: [
                "880100",
                "6474657374",
                format!("54{}", "aa".repeat(20)).as_str(),
                "f6",
                format!("54{}", "bb".repeat(20)).as_str(),
                "181f",
                "00",
            ]
            .concat(),
        },
        WireVector {
            name: "Renewal",
            message: BridgeMessage::Renewal {
                token_id: TokenId::from_bytes([0x11; 32]),
                expiry: 1_700_000_000,
            },
            expected_hex: ["840101", format!("5820{}", "11".repeat(32)).as_str(), "1a6553f100"].concat(),
        },
    ]
}

/// Check every vector: encoding matches, and decoding gives the message back.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = v.message.encode().map(hex::encode).unwrap_or_default();
            let decodes = hex::decode(&v.expected_hex)
                .ok()
                .and_then(|bytes| BridgeMessage::decode(&bytes).ok())
                .map_or(false, |decoded| decoded == v.message);

            (v.name.to_string(), decodes && actual == v.expected_hex, actual)
        })
        .collect()
}

/// Decode a hex vector.
pub fn decode_hex(hex_str: &str) -> Result<BridgeMessage, MessageError> {
    let bytes = hex::decode(hex_str).map_err(|e| MessageError::Malformed(e.to_string()))?;
    BridgeMessage::decode(&bytes)
}

/// All vectors as a JSON array.
pub fn export_json() -> serde_json::Result<String> {
    let vectors = all_vectors();
    let exported: Vec<ExportedVector<'_>> = vectors
        .iter()
        .map(|v| ExportedVector {
            name: v.name,
            kind: format!("{:?}", v.message.kind()),
            hex: &v.expected_hex,
        })
        .collect();
    serde_json::to_string_pretty(&exported)
}
