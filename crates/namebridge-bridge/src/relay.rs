//! Relay between a ledger and a transport.
//!
//! The relay drains a ledger's outbox onto the transport and delivers
//! inbound envelopes back to the ledger as its ejector. It never retries:
//! a failed delivery is logged and dropped.
//!
//! Before delivery every ejection passes a [`ReplayGuard`]. The registry
//! already rejects an injection the controller cannot perform, but a stale
//! duplicate of an old ejection can arrive at a moment when the controller
//! does hold the name again (after a round trip), and would then be applied
//! a second time. The guard remembers the highest ejection sequence
//! delivered per origin and name and drops anything at or below it.
//! Renewals are not sequence-checked; expiry only moves forward.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use namebridge_core::{Account, ResourceId};

use crate::error::Result;
use crate::message::MessageKind;
use crate::outbox::Envelope;
use crate::transport::Transport;

/// Configuration for a [`Relay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// How long [`Relay::pump`] waits for the next envelope.
    pub recv_timeout: Duration,
    /// Maximum envelopes delivered per pump.
    pub max_batch: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_millis(100),
            max_batch: 256,
        }
    }
}

/// A ledger as seen by the relay.
pub trait Endpoint {
    type Error: std::fmt::Display;

    /// Take every envelope waiting to leave.
    fn drain_outbox(&mut self) -> Vec<Envelope>;

    /// Apply an inbound payload, acting as `relayer`.
    fn deliver(&mut self, relayer: Account, payload: &[u8]) -> std::result::Result<(), Self::Error>;
}

/// Highest delivered ejection sequence per (origin, resource).
#[derive(Debug, Default, Clone)]
pub struct ReplayGuard {
    delivered: HashMap<(Account, ResourceId), u64>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last ejection sequence delivered from `origin` for `resource`.
    pub fn last_delivered(&self, origin: &Account, resource: &ResourceId) -> u64 {
        self.delivered
            .get(&(*origin, *resource))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the envelope may be delivered.
    pub fn admits(&self, envelope: &Envelope) -> bool {
        match envelope.kind {
            MessageKind::Renewal => true,
            MessageKind::Ejection => {
                envelope.ejection_seq > self.last_delivered(&envelope.origin, &envelope.resource)
            }
        }
    }

    /// Note a successful delivery.
    pub fn record(&mut self, envelope: &Envelope) {
        if envelope.kind != MessageKind::Ejection {
            return;
        }
        let last = self
            .delivered
            .entry((envelope.origin, envelope.resource))
            .or_insert(0);
        *last = (*last).max(envelope.ejection_seq);
    }
}

/// Counters from one [`Relay::pump`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    /// Ejections dropped by the replay guard.
    pub replayed: usize,
    /// Envelopes from unexpected peers, or rejected by the ledger.
    pub failed: usize,
}

/// Moves envelopes between one ledger and its peer.
pub struct Relay<T: Transport> {
    transport: T,
    peer: Account,
    relayer: Account,
    guard: ReplayGuard,
    config: RelayConfig,
}

impl<T: Transport> Relay<T> {
    /// `peer` is the counterpart controller; `relayer` is the account that
    /// holds the ejector role on the local controller.
    pub fn new(transport: T, peer: Account, relayer: Account, config: RelayConfig) -> Self {
        Self {
            transport,
            peer,
            relayer,
            guard: ReplayGuard::new(),
            config,
        }
    }

    pub fn guard(&self) -> &ReplayGuard {
        &self.guard
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send everything in the endpoint's outbox to the peer.
    ///
    /// Stops at the first transport failure; envelopes not yet sent are lost.
    pub async fn flush<E: Endpoint>(&self, endpoint: &mut E) -> Result<usize> {
        let envelopes = endpoint.drain_outbox();
        let total = envelopes.len();

        for (sent, envelope) in envelopes.into_iter().enumerate() {
            if let Err(e) = self.transport.send(&self.peer, envelope).await {
                warn!(peer = %self.peer, sent, total, error = %e, "flush aborted");
                return Err(e);
            }
        }

        debug!(local = %self.transport.local_id(), peer = %self.peer, total, "outbox flushed");
        Ok(total)
    }

    /// Deliver inbound envelopes until the transport goes quiet or the
    /// batch limit is reached.
    pub async fn pump<E: Endpoint>(&mut self, endpoint: &mut E) -> Result<RelayReport> {
        let mut report = RelayReport::default();

        for _ in 0..self.config.max_batch {
            let Some((from, envelope)) = self.transport.recv_timeout(self.config.recv_timeout).await?
            else {
                break;
            };

            if from != self.peer || envelope.origin != self.peer {
                warn!(%from, origin = %envelope.origin, "envelope from unexpected peer dropped");
                report.failed += 1;
                continue;
            }

            if !self.guard.admits(&envelope) {
                warn!(
                    resource = %envelope.resource,
                    seq = envelope.ejection_seq,
                    last = self.guard.last_delivered(&envelope.origin, &envelope.resource),
                    "stale ejection dropped"
                );
                report.replayed += 1;
                continue;
            }

            match endpoint.deliver(self.relayer, &envelope.payload) {
                Ok(()) => {
                    self.guard.record(&envelope);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(resource = %envelope.resource, kind = ?envelope.kind, error = %e, "delivery failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
