//! # Namebridge Registry
//!
//! The permissioned ownership ledger for names on one chain.
//!
//! ## Key Types
//!
//! - [`Registry`] - Entries, ownership, role grants, expiry
//! - [`Registration`] - Parameters for registering a name
//! - [`RenewOutcome`] - What a renewal did, including the observer to notify
//! - [`NameInfo`] / [`NameStatus`] - Comprehensive name lookup
//! - [`RegistryConfig`] - Tunables
//!
//! ## Roles
//!
//! Role checks accept grants on the name's resource or on
//! [`ResourceId::ROOT`](namebridge_core::ResourceId::ROOT). Only grants on the
//! resource itself are counted by [`Registry::assignee_count`], which is what
//! bridge controllers use to prove a name has a single controlling account
//! before it leaves the ledger.
//!
//! Grants move with the token: a transfer hands every role the sender held on
//! the resource to the recipient.

pub mod config;
pub mod error;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use registry::{NameInfo, NameStatus, Registration, Registry, RenewOutcome};
