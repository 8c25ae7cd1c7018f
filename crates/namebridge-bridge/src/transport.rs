//! Transport abstraction between the two ledgers.
//!
//! The contract is weak: envelopes are delivered at least once
//! with no ordering guarantee across names. Anything stronger belongs to a
//! concrete transport.

use async_trait::async_trait;

use namebridge_core::Account;

use crate::error::{BridgeError, Result};
use crate::outbox::Envelope;

/// Carrier for envelopes between controllers.
///
/// Implementations must be thread-safe (Send + Sync). Endpoints are
/// addressed by controller account.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an envelope to a specific peer.
    async fn send(&self, peer: &Account, envelope: Envelope) -> Result<()>;

    /// Receive the next envelope from any peer.
    async fn recv(&self) -> Result<(Account, Envelope)>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before an envelope arrives.
    async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Option<(Account, Envelope)>>;

    /// Account this transport delivers to.
    fn local_id(&self) -> Account;
}

/// In-process transport over tokio channels.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    /// Channel capacity per endpoint.
    const CHANNEL_CAPACITY: usize = 1024;

    /// Shared routing table for connected endpoints.
    #[derive(Default)]
    pub struct MemoryNetwork {
        senders: RwLock<HashMap<Account, mpsc::Sender<(Account, Envelope)>>>,
    }

    impl MemoryNetwork {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Connect an endpoint for `local_id`.
        pub async fn create_transport(self: &Arc<Self>, local_id: Account) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            self.senders.write().await.insert(local_id, tx);

            MemoryTransport {
                local_id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Disconnect an endpoint. Later sends to it fail.
        pub async fn disconnect(&self, id: &Account) {
            self.senders.write().await.remove(id);
        }
    }

    pub struct MemoryTransport {
        local_id: Account,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<(Account, Envelope)>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, peer: &Account, envelope: Envelope) -> Result<()> {
            let sender = self
                .network
                .senders
                .read()
                .await
                .get(peer)
                .cloned()
                .ok_or_else(|| BridgeError::Transport(format!("peer not found: {}", peer)))?;
            sender
                .send((self.local_id, envelope))
                .await
                .map_err(|_| BridgeError::Transport("peer disconnected".into()))
        }

        async fn recv(&self) -> Result<(Account, Envelope)> {
            let mut rx = self.receiver.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| BridgeError::Transport("channel closed".into()))
        }

        async fn recv_timeout(
            &self,
            timeout: std::time::Duration,
        ) -> Result<Option<(Account, Envelope)>> {
            let mut rx = self.receiver.lock().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(received)) => Ok(Some(received)),
                Ok(None) => Err(BridgeError::Transport("channel closed".into())),
                Err(_) => Ok(None),
            }
        }

        fn local_id(&self) -> Account {
            self.local_id
        }
    }
}
