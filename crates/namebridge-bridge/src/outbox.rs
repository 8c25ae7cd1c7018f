//! Send side of the bridge.
//!
//! Controllers hand encoded messages to a [`Bridge`]. The [`Outbox`]
//! implementation queues them as [`Envelope`]s until a relay drains them,
//! so a ledger operation that fails after sending can take its messages
//! back.
//!
//! Envelopes leave [`Bridge::send_message`] unsequenced. The owner of the
//! outbox stamps them with [`Outbox::stamp_since`] from a durable counter
//! before the step that produced them commits.

use bytes::Bytes;

use namebridge_core::{Account, ResourceId};

use crate::error::{BridgeError, Result};
use crate::message::{BridgeMessage, MessageKind};

/// Where controllers put outgoing messages.
pub trait Bridge {
    fn send_message(&mut self, message: &[u8]) -> Result<()>;
}

/// A message in transit between ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Account of the sending controller.
    pub origin: Account,
    pub resource: ResourceId,
    pub kind: MessageKind,
    /// Number of ejections of `resource` the origin has sent, this one
    /// included. Renewals carry the latest value without bumping it.
    /// Zero until stamped.
    pub ejection_seq: u64,
    /// Encoded [`BridgeMessage`].
    pub payload: Bytes,
}

/// Position in an [`Outbox`] to roll back to.
#[derive(Debug, Clone)]
pub struct OutboxMark {
    pending: usize,
}

/// Queue of outgoing envelopes for one controller.
#[derive(Debug)]
pub struct Outbox {
    origin: Account,
    pending: Vec<Envelope>,
}

impl Outbox {
    pub fn new(origin: Account) -> Self {
        Self {
            origin,
            pending: Vec::new(),
        }
    }

    pub fn origin(&self) -> Account {
        self.origin
    }

    /// Envelopes waiting to be relayed, oldest first.
    pub fn pending(&self) -> &[Envelope] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending envelope.
    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.pending)
    }

    pub fn mark(&self) -> OutboxMark {
        OutboxMark {
            pending: self.pending.len(),
        }
    }

    /// Discard everything sent since `mark`.
    pub fn rollback_to(&mut self, mark: OutboxMark) {
        self.pending.truncate(mark.pending);
    }

    /// Assign ejection sequences to the envelopes queued since `mark`.
    ///
    /// `next` is called once per envelope, in order, and returns the
    /// sequence to carry.
    pub fn stamp_since<E, F>(&mut self, mark: &OutboxMark, mut next: F) -> std::result::Result<(), E>
    where
        F: FnMut(&ResourceId, MessageKind) -> std::result::Result<u64, E>,
    {
        let start = mark.pending.min(self.pending.len());
        for envelope in &mut self.pending[start..] {
            envelope.ejection_seq = next(&envelope.resource, envelope.kind)?;
        }
        Ok(())
    }
}

impl Bridge for Outbox {
    fn send_message(&mut self, message: &[u8]) -> Result<()> {
        let decoded = BridgeMessage::decode(message)?;
        let resource = decoded.resource().map_err(|e| BridgeError::Transport(e.to_string()))?;

        self.pending.push(Envelope {
            origin: self.origin,
            resource,
            kind: decoded.kind(),
            ejection_seq: 0,
            payload: Bytes::copy_from_slice(message),
        });
        Ok(())
    }
}
