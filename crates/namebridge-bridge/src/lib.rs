//! # Namebridge Bridge
//!
//! Moves custody of a name between two independent ledgers.
//!
//! ## Overview
//!
//! A name leaves a ledger by being transferred to that ledger's controller
//! together with a [`TransferData`](namebridge_core::TransferData) payload.
//! The controller checks that every critical role on the name has exactly
//! one holder, freezes the entry and sends an `Ejection` message. The
//! counterpart controller restores the entry and hands the name to the
//! payload's owner.
//!
//! ## Key Types
//!
//! - [`BridgeController`] - Shared ejection and injection logic
//! - [`HomeController`] / [`RemoteController`] - Direction-specific variants
//! - [`BridgeMessage`] - The versioned wire codec
//! - [`Bridge`] / [`Outbox`] - Send side used by controllers
//! - [`Transport`] - Async carrier, with an in-memory implementation
//! - [`Relay`] / [`ReplayGuard`] - Moves envelopes and drops stale ejections
//!
//! ## Message Flow
//!
//! ```text
//! Home ledger                                Remote ledger
//!   transfer(owner -> controller, td)
//!   eject: check roles, freeze, send
//!   |-------- Ejection(td) ---------------->| seed if absent, inject
//!   renew: observer = controller
//!   |-------- Renewal(token, expiry) ------>| extend local expiry
//! ```

pub mod controller;
pub mod error;
pub mod home;
pub mod message;
pub mod outbox;
pub mod relay;
pub mod remote;
pub mod transport;

pub use controller::{Applied, BridgeConfig, BridgeController, ControllerCore};
pub use error::{BridgeError, ErrorKind, MessageError, Result};
pub use home::HomeController;
pub use message::{BridgeMessage, MessageKind, WIRE_VERSION};
pub use outbox::{Bridge, Envelope, Outbox, OutboxMark};
pub use relay::{Endpoint, Relay, RelayConfig, RelayReport, ReplayGuard};
pub use remote::RemoteController;
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
