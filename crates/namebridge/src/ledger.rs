//! The Ledger: one registry, its bridge controller, and an outbox.
//!
//! A ledger stands in for the host chain. Every mutation is one atomic
//! step: the datastore is checkpointed and the outbox marked before the
//! step runs, and both roll back if it fails. Entries, grants, events and
//! outgoing messages are therefore committed together or not at all.
//!
//! Outgoing envelopes are stamped inside the same step from the per-name
//! ejection counter in the datastore, so sequences keep counting up across
//! restarts of a persistent ledger.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use namebridge_bridge::{
    Applied, BridgeConfig, BridgeController, ControllerCore, Endpoint, Envelope, HomeController,
    MessageKind, Outbox, RemoteController,
};
use namebridge_core::{
    Account, Event, ResourceId, RoleBitmap, TokenId, TokenObserver, TransferData,
};
use namebridge_registry::{NameInfo, Registration, Registry, RegistryConfig, RenewOutcome};
use namebridge_store::Datastore;

use crate::error::{LedgerError, Result};

/// Configuration for a [`Ledger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub registry: RegistryConfig,
    pub bridge: BridgeConfig,
}

/// Well-known accounts on a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerAccounts {
    /// Holds every root role and administers the controller.
    pub deployer: Account,
    /// The registry's own account; the only caller of renewal callbacks.
    pub registry: Account,
    /// The bridge controller.
    pub controller: Account,
}

impl LedgerAccounts {
    /// Fresh random accounts.
    pub fn random() -> Self {
        Self {
            deployer: Account::random(),
            registry: Account::random(),
            controller: Account::random(),
        }
    }
}

/// A ledger on the home side of the bridge.
pub type HomeLedger<D> = Ledger<D, HomeController>;

/// A ledger on the remote side of the bridge.
pub type RemoteLedger<D> = Ledger<D, RemoteController>;

/// A registry joined to a bridge controller.
pub struct Ledger<D: Datastore, C: BridgeController> {
    config: LedgerConfig,
    accounts: LedgerAccounts,
    registry: Registry<D>,
    controller: C,
    outbox: Outbox,
}

impl<D: Datastore> Ledger<D, HomeController> {
    pub fn home(store: D, config: LedgerConfig, accounts: LedgerAccounts) -> Result<Self> {
        Self::new(store, config, accounts, HomeController::new)
    }
}

impl<D: Datastore> Ledger<D, RemoteController> {
    pub fn remote(store: D, config: LedgerConfig, accounts: LedgerAccounts) -> Result<Self> {
        Self::new(store, config, accounts, RemoteController::new)
    }

    /// Materialize an inbound name on behalf of an ejector.
    pub fn complete_ejection(&mut self, caller: Account, data: &TransferData) -> Result<TokenId> {
        self.atomically(|registry, controller, _| {
            Ok(controller.complete_ejection(registry, caller, data)?)
        })
    }
}

impl<D: Datastore, C: BridgeController> Ledger<D, C> {
    /// Create a ledger over `store`.
    ///
    /// The deployer receives every root role and grants the controller the
    /// root roles its configuration requires. Reopening an existing store
    /// is fine; the grants are idempotent.
    pub fn new<F>(store: D, config: LedgerConfig, accounts: LedgerAccounts, build: F) -> Result<Self>
    where
        F: FnOnce(ControllerCore) -> C,
    {
        let mut registry = Registry::new(store, config.registry.clone(), accounts.deployer)?;
        let required = config.bridge.required_root_roles();
        let held = registry.roles(ResourceId::ROOT, accounts.controller)?;
        if !held.contains(required) {
            registry.grant_roles(
                accounts.deployer,
                ResourceId::ROOT,
                accounts.controller,
                required.difference(held),
            )?;
        }

        let controller = build(ControllerCore::new(
            accounts.controller,
            accounts.registry,
            accounts.deployer,
            config.bridge.clone(),
        ));

        info!(controller = %accounts.controller, "ledger ready");
        Ok(Self {
            config,
            accounts,
            registry,
            controller,
            outbox: Outbox::new(accounts.controller),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn accounts(&self) -> LedgerAccounts {
        self.accounts
    }

    pub fn registry(&self) -> &Registry<D> {
        &self.registry
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn timestamp(&self) -> u64 {
        self.registry.timestamp()
    }

    /// Advance the block clock.
    pub fn set_timestamp(&mut self, now: u64) {
        self.registry.set_timestamp(now);
    }

    /// Run `f` as one atomic step.
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Registry<D>, &mut C, &mut Outbox) -> Result<T>,
    {
        let mark = self.outbox.mark();
        self.registry.store_mut().begin()?;

        let result = f(&mut self.registry, &mut self.controller, &mut self.outbox).and_then(|value| {
            let store = self.registry.store_mut();
            self.outbox.stamp_since(&mark, |resource, kind| -> Result<u64> {
                let mut seq = store.get_ejection_seq(resource)?;
                if kind == MessageKind::Ejection {
                    seq += 1;
                    store.put_ejection_seq(resource, seq)?;
                }
                Ok(seq)
            })?;
            Ok(value)
        });

        match result {
            Ok(value) => {
                self.registry.store_mut().commit()?;
                Ok(value)
            }
            Err(e) => {
                self.registry.store_mut().rollback()?;
                self.outbox.rollback_to(mark);
                debug!(error = %e, "step rolled back");
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn register(&mut self, caller: Account, registration: Registration) -> Result<TokenId> {
        self.atomically(|registry, _, _| Ok(registry.register(caller, registration)?))
    }

    /// Renew a name and notify its token observer.
    ///
    /// When the observer is this ledger's controller it is called with the
    /// registry as caller; if it refuses, the renewal is undone.
    pub fn renew(&mut self, caller: Account, token_id: TokenId, expiry: u64) -> Result<RenewOutcome> {
        let registry_account = self.accounts.registry;
        let controller_account = self.controller.account();

        self.atomically(|registry, controller, outbox| {
            let outcome = registry.renew(caller, token_id, expiry)?;
            match outcome.observer {
                TokenObserver::None => {}
                TokenObserver::Controller(observer) if observer == controller_account => {
                    controller.on_renew(outbox, registry_account, token_id, expiry, caller)?;
                }
                TokenObserver::Controller(observer) => {
                    return Err(LedgerError::UnknownObserver(observer));
                }
            }
            Ok(outcome)
        })
    }

    pub fn burn(&mut self, caller: Account, token_id: TokenId) -> Result<()> {
        self.atomically(|registry, _, _| Ok(registry.burn(caller, token_id)?))
    }

    pub fn set_subregistry(
        &mut self,
        caller: Account,
        token_id: TokenId,
        subregistry: Option<Account>,
    ) -> Result<()> {
        self.atomically(|registry, _, _| Ok(registry.set_subregistry(caller, token_id, subregistry)?))
    }

    pub fn set_resolver(
        &mut self,
        caller: Account,
        token_id: TokenId,
        resolver: Option<Account>,
    ) -> Result<()> {
        self.atomically(|registry, _, _| Ok(registry.set_resolver(caller, token_id, resolver)?))
    }

    pub fn set_token_observer(
        &mut self,
        caller: Account,
        token_id: TokenId,
        observer: TokenObserver,
    ) -> Result<()> {
        self.atomically(|registry, _, _| {
            Ok(registry.set_token_observer(caller, token_id, observer)?)
        })
    }

    pub fn set_approval_for_all(
        &mut self,
        owner: Account,
        operator: Account,
        approved: bool,
    ) -> Result<()> {
        self.atomically(|registry, _, _| {
            Ok(registry.set_approval_for_all(owner, operator, approved)?)
        })
    }

    pub fn grant_roles(
        &mut self,
        caller: Account,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
    ) -> Result<()> {
        self.atomically(|registry, _, _| Ok(registry.grant_roles(caller, resource, account, roles)?))
    }

    pub fn revoke_roles(
        &mut self,
        caller: Account,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
    ) -> Result<()> {
        self.atomically(|registry, _, _| {
            Ok(registry.revoke_roles(caller, resource, account, roles)?)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transfers and Ejection
    // ─────────────────────────────────────────────────────────────────────────

    /// Plain transfer. Transfers to the controller need a payload; use
    /// [`Ledger::safe_transfer_from`].
    pub fn transfer(
        &mut self,
        caller: Account,
        from: Account,
        to: Account,
        token_id: TokenId,
    ) -> Result<()> {
        self.safe_transfer_from(caller, from, to, token_id, None)
    }

    /// Transfer with payload. Sending a name to the controller ejects it in
    /// the same step.
    pub fn safe_transfer_from(
        &mut self,
        caller: Account,
        from: Account,
        to: Account,
        token_id: TokenId,
        data: Option<&TransferData>,
    ) -> Result<()> {
        let controller_account = self.controller.account();
        let ejection = match (to == controller_account, data) {
            (true, None) => return Err(LedgerError::MissingTransferData(token_id)),
            (true, Some(data)) => Some(data),
            (false, _) => None,
        };

        self.atomically(|registry, controller, outbox| {
            registry.transfer(caller, from, to, token_id)?;
            if let Some(data) = ejection {
                controller.eject(registry, outbox, token_id, data)?;
            }
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bridge Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Let `account` deliver messages to the controller. Deployer only.
    pub fn grant_ejector(&mut self, caller: Account, account: Account) -> Result<()> {
        Ok(self.controller.core_mut().grant_ejector(caller, account)?)
    }

    pub fn revoke_ejector(&mut self, caller: Account, account: Account) -> Result<()> {
        Ok(self.controller.core_mut().revoke_ejector(caller, account)?)
    }

    /// Apply an inbound message.
    pub fn deliver(&mut self, caller: Account, payload: &[u8]) -> Result<Applied> {
        self.atomically(|registry, controller, _| {
            Ok(controller.receive_message(registry, caller, payload)?)
        })
    }

    /// Hand a name the controller holds to `data.owner`.
    pub fn complete_injection(&mut self, caller: Account, data: &TransferData) -> Result<TokenId> {
        self.atomically(|registry, controller, _| {
            Ok(controller.complete_injection(registry, caller, data)?)
        })
    }

    /// Take every envelope waiting to leave.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        self.outbox.drain()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn owner_of(&self, token_id: TokenId) -> Result<Account> {
        Ok(self.registry.owner_of(token_id)?)
    }

    pub fn token_id_of(&self, label: &str) -> Result<TokenId> {
        Ok(self.registry.token_id_of(label)?)
    }

    pub fn name_info(&self, label: &str) -> Result<NameInfo> {
        Ok(self.registry.name_info(label)?)
    }

    pub fn roles(&self, resource: ResourceId, account: Account) -> Result<RoleBitmap> {
        Ok(self.registry.roles(resource, account)?)
    }

    pub fn events(&self) -> Result<Vec<Event>> {
        Ok(self.registry.events()?)
    }

    /// Ejections this ledger has sent for `resource`.
    pub fn ejection_seq(&self, resource: ResourceId) -> Result<u64> {
        Ok(self.registry.store().get_ejection_seq(&resource)?)
    }
}

impl<D: Datastore, C: BridgeController> Endpoint for Ledger<D, C> {
    type Error = LedgerError;

    fn drain_outbox(&mut self) -> Vec<Envelope> {
        Ledger::drain_outbox(self)
    }

    fn deliver(&mut self, relayer: Account, payload: &[u8]) -> Result<()> {
        Ledger::deliver(self, relayer, payload).map(|_| ())
    }
}
