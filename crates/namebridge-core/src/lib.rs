//! # namebridge core
//!
//! Pure primitives for the namebridge registry and bridge controllers.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Account`] - A ledger address
//! - [`ResourceId`] - Stable key for a name's entry and role grants
//! - [`TokenId`] - Versioned ownership token for a name
//! - [`RoleBitmap`] - Permission flags, with [`RoleCounts`] tracking holders
//! - [`Entry`] - The registry record for a name
//! - [`TransferData`] - Snapshot carried by a cross-chain ejection
//! - [`Event`] - Log records emitted by registry and controllers

pub mod entry;
pub mod error;
pub mod event;
pub mod roles;
pub mod transfer;
pub mod types;

pub use entry::{Entry, ResolverSlot, TokenObserver};
pub use error::CoreError;
pub use event::Event;
pub use roles::{AssigneeCount, RoleBitmap, RoleCounts, ROLE_SLOTS};
pub use transfer::TransferData;
pub use types::{label_of, normalize_label, Account, LabelHash, ResourceId, TokenId, MAX_LABEL_LEN};
