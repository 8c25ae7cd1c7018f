//! # Namebridge Store
//!
//! Persistence for a single ledger's registry: name entries, role grants,
//! holder counters, operator approvals, the event log and the bridge's
//! per-name ejection counters.
//!
//! ## Key Types
//!
//! - [`Datastore`] - The trait every backend implements
//! - [`DatastoreExt`] - Helpers built on top of it
//! - [`SqliteDatastore`] - SQLite-based persistent storage
//! - [`MemoryDatastore`] - In-memory storage for tests and simulations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use namebridge_store::{Datastore, SqliteDatastore};
//! use namebridge_core::ResourceId;
//!
//! let store = SqliteDatastore::open("registry.db").unwrap();
//! let resource = ResourceId::from_label("test").unwrap();
//! assert!(store.get_entry(&resource).unwrap().is_none());
//! ```
//!
//! ## Design Notes
//!
//! - **No policy**: the store never checks permissions or expiry
//! - **Checkpoints**: `begin`/`commit`/`rollback` nest, and the event log is
//!   covered by them, so an aborted operation emits nothing

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryDatastore;
pub use sqlite::SqliteDatastore;
pub use traits::{Datastore, DatastoreExt};
