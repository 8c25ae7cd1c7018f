//! # Namebridge Testkit
//!
//! Testing utilities for Namebridge.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Wire vectors**: Pinned encodings of every bridge message type
//! - **Generators**: Proptest strategies for labels, payloads and role layouts
//! - **Fixtures**: A home and a remote ledger joined by a hand-driven relay
//!
//! ## Wire Vectors
//!
//! ```rust
//! use namebridge_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use namebridge_testkit::generators::RoleLayout;
//!
//! proptest! {
//!     #[test]
//!     fn layout_is_checked(layout: RoleLayout) {
//!         // grant layout.grants, then eject
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use namebridge_testkit::fixtures::{account, BridgeFixture};
//! use namebridge_core::{RoleBitmap, TransferData};
//!
//! let mut fixture = BridgeFixture::new().unwrap();
//! let owner = account(1);
//! let token = fixture.register_home("test", owner, RoleBitmap::CRITICAL).unwrap();
//! fixture.eject_home(owner, token, &TransferData::new("test", owner)).unwrap();
//! assert!(fixture.relay_home_to_remote().iter().all(|r| r.is_ok()));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{account, parties, BridgeFixture};
pub use generators::{transfer_data, RoleLayout};
pub use vectors::{all_vectors, export_json, verify_all_vectors, WireVector};
