//! # Namebridge
//!
//! A permissioned name registry that can move custody of a name to a second,
//! independent ledger and back.
//!
//! ## Overview
//!
//! Each side of the bridge is a [`Ledger`]: a registry, a bridge controller
//! and an outbox. A name owner sends the name to the controller together
//! with a [`TransferData`] payload. The controller checks that every
//! critical role on the name has exactly one holder, freezes the entry and
//! queues an `Ejection` message. The counterpart ledger applies the message
//! and hands the name to the payload's owner.
//!
//! ## Key Concepts
//!
//! - **Resource**: Stable key for a name's role grants. Survives re-registration.
//! - **Token id**: Resource plus version. Changes when an expired name is re-registered.
//! - **Critical roles**: Roles that must have exactly one holder before a name can leave.
//! - **Token observer**: The controller, when it must hear about renewals.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use namebridge::{Ledger, LedgerAccounts, LedgerConfig, Registration};
//! use namebridge::core::{RoleBitmap, TransferData};
//! use namebridge::store::SqliteDatastore;
//!
//! fn example() -> namebridge::Result<()> {
//!     let accounts = LedgerAccounts::random();
//!     let store = SqliteDatastore::open("home.db")?;
//!     let mut home = Ledger::home(store, LedgerConfig::default(), accounts)?;
//!
//!     let owner = namebridge::core::Account::random();
//!     let token = home.register(
//!         accounts.deployer,
//!         Registration::new("test", owner, 1_800_000_000).with_roles(RoleBitmap::CRITICAL),
//!     )?;
//!
//!     // Send the name across; the ejection message waits in the outbox.
//!     let data = TransferData::new("test", owner);
//!     home.safe_transfer_from(owner, owner, accounts.controller, token, Some(&data))?;
//!     let _envelopes = home.drain_outbox();
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `namebridge::core` - Identifiers, roles, entries, transfer payloads, events
//! - `namebridge::store` - Datastore abstraction, in-memory and SQLite backends
//! - `namebridge::registry` - The permissioned registry
//! - `namebridge::bridge` - Controllers, wire codec, transport and relay

pub mod error;
pub mod ledger;

// Re-export component crates
pub use namebridge_bridge as bridge;
pub use namebridge_core as core;
pub use namebridge_registry as registry;
pub use namebridge_store as store;

// Re-export main types for convenience
pub use error::{LedgerError, Result};
pub use ledger::{HomeLedger, Ledger, LedgerAccounts, LedgerConfig, RemoteLedger};

// Re-export commonly used types
pub use namebridge_bridge::{
    Applied, BridgeConfig, BridgeController, BridgeMessage, Envelope, ErrorKind, HomeController,
    Relay, RelayConfig, RemoteController,
};
pub use namebridge_core::{Account, Event, ResourceId, RoleBitmap, TokenId, TransferData};
pub use namebridge_registry::{NameInfo, NameStatus, Registration, RegistryConfig};
