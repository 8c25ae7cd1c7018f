//! Shared bridge controller logic.
//!
//! A controller is an account on its ledger's registry. Names leave the
//! ledger by being transferred to it ([`BridgeController::eject`]) and come
//! back through an inbound message ([`BridgeController::inject`]).
//!
//! ```text
//! HOME ──transfer──► EJECTING ──send──► IN_FLIGHT ──inject──► REMOTELY_INJECTED
//!                                          │
//!                                          └── expiry + re-register ──► reclaimed locally
//! ```
//!
//! While a name is in flight the controller owns it, holds whatever roles
//! moved with the token, and the resolver slot is [`ResolverSlot::InFlight`].
//!
//! [`ResolverSlot::InFlight`]: namebridge_core::ResolverSlot::InFlight

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use namebridge_core::{Account, Event, RoleBitmap, TokenId, TokenObserver, TransferData};
use namebridge_registry::Registry;
use namebridge_store::Datastore;

use crate::error::{BridgeError, Result};
use crate::message::BridgeMessage;
use crate::outbox::Bridge;

/// Role sets a controller enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Roles that must have exactly one holder before a name can leave.
    pub critical_roles: RoleBitmap,
    /// Roles an inbound message may grant to the receiving owner.
    pub assignable_roles: RoleBitmap,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            critical_roles: RoleBitmap::CRITICAL,
            assignable_roles: RoleBitmap::ASSIGNABLE,
        }
    }
}

impl BridgeConfig {
    /// Root roles a controller needs on its registry: seeding and renewing
    /// names, restoring entry fields, and granting the assignable roles.
    pub fn required_root_roles(&self) -> RoleBitmap {
        RoleBitmap::REGISTRAR
            | RoleBitmap::RENEW
            | RoleBitmap::SET_SUBREGISTRY
            | RoleBitmap::SET_RESOLVER
            | RoleBitmap::SET_TOKEN_OBSERVER
            | self.assignable_roles.admin()
    }
}

/// State common to every controller variant.
#[derive(Debug, Clone)]
pub struct ControllerCore {
    account: Account,
    registry: Account,
    admin: Account,
    config: BridgeConfig,
    ejectors: BTreeSet<Account>,
}

impl ControllerCore {
    /// `registry` is the only account allowed to deliver renewal callbacks;
    /// `admin` manages the ejector role.
    pub fn new(account: Account, registry: Account, admin: Account, config: BridgeConfig) -> Self {
        Self {
            account,
            registry,
            admin,
            config,
            ejectors: BTreeSet::new(),
        }
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn registry_account(&self) -> Account {
        self.registry
    }

    pub fn admin(&self) -> Account {
        self.admin
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn grant_ejector(&mut self, caller: Account, account: Account) -> Result<()> {
        if caller != self.admin {
            return Err(BridgeError::NotAdmin(caller));
        }
        self.ejectors.insert(account);
        debug!(controller = %self.account, ejector = %account, "ejector granted");
        Ok(())
    }

    pub fn revoke_ejector(&mut self, caller: Account, account: Account) -> Result<()> {
        if caller != self.admin {
            return Err(BridgeError::NotAdmin(caller));
        }
        self.ejectors.remove(&account);
        Ok(())
    }

    pub fn is_ejector(&self, account: Account) -> bool {
        self.ejectors.contains(&account)
    }

    pub fn check_ejector(&self, caller: Account) -> Result<()> {
        if self.is_ejector(caller) {
            Ok(())
        } else {
            Err(BridgeError::NotEjector(caller))
        }
    }

    pub fn check_registry(&self, caller: Account) -> Result<()> {
        if caller == self.registry {
            Ok(())
        } else {
            Err(BridgeError::NotRegistry(caller))
        }
    }
}

/// What an inbound message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A name was handed to its owner on this ledger.
    Injected(TokenId),
    /// A name's local expiry was extended.
    Renewed { token_id: TokenId, expiry: u64 },
}

/// A bridge controller. Variants decide how inbound messages and renewal
/// callbacks are handled; ejection and injection are shared.
pub trait BridgeController: Send {
    fn core(&self) -> &ControllerCore;

    fn core_mut(&mut self) -> &mut ControllerCore;

    fn account(&self) -> Account {
        self.core().account()
    }

    /// Apply an inbound `Ejection`.
    fn apply_ejection<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        data: &TransferData,
    ) -> Result<TokenId>;

    /// Apply an inbound `Renewal`.
    fn apply_renewal<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        token_id: TokenId,
        expiry: u64,
    ) -> Result<TokenId>;

    /// Token-observer callback, invoked by the registry after a renewal of a
    /// name this controller observes.
    fn on_renew(
        &mut self,
        bridge: &mut dyn Bridge,
        caller: Account,
        token_id: TokenId,
        expiry: u64,
        renewed_by: Account,
    ) -> Result<()>;

    /// Take custody of a name that was just transferred to this controller
    /// and send it to the other ledger.
    ///
    /// Returns the payload that was sent.
    fn eject<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        bridge: &mut dyn Bridge,
        token_id: TokenId,
        data: &TransferData,
    ) -> Result<TransferData> {
        let me = self.account();
        let config = self.core().config().clone();

        if data.owner.is_zero() {
            return Err(BridgeError::InvalidOwner);
        }
        let invalid_label = || BridgeError::InvalidLabel {
            label: data.label.clone(),
            token_id: Some(token_id),
        };
        let resource = data.resource().map_err(|_| invalid_label())?;
        if resource != token_id.resource() {
            return Err(invalid_label());
        }
        if registry.owner_of(token_id)? != me {
            return Err(BridgeError::NotTokenOwner(token_id));
        }

        let count = registry.assignee_count(resource, config.critical_roles)?;
        if !count.exactly_one_each() {
            return Err(BridgeError::TooManyRoleAssignees {
                token_id,
                roles: count.offending(),
            });
        }

        let entry = registry
            .entry(resource)?
            .ok_or(BridgeError::NotTokenOwner(token_id))?;

        registry.set_subregistry(me, token_id, None)?;
        registry.mark_in_flight(me, token_id)?;
        registry.set_token_observer(me, token_id, TokenObserver::Controller(me))?;

        let outgoing = TransferData {
            label: entry.label.clone(),
            owner: data.owner,
            subregistry: data.subregistry,
            resolver: data.resolver,
            role_bitmap: data.role_bitmap & config.assignable_roles,
            expiry: entry.expiry,
        };
        registry.emit(Event::EjectionInitiated {
            token_id,
            label: entry.label,
            owner: data.owner,
        })?;
        bridge.send_message(&BridgeMessage::Ejection(outgoing.clone()).encode()?)?;

        debug!(controller = %me, %token_id, owner = %data.owner, "ejection initiated");
        Ok(outgoing)
    }

    /// Inject on behalf of an ejector.
    fn complete_injection<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        caller: Account,
        data: &TransferData,
    ) -> Result<TokenId> {
        self.core().check_ejector(caller)?;
        self.inject(registry, data)
    }

    /// Restore a name this controller holds and hand it to `data.owner`.
    ///
    /// Fails with [`BridgeError::NotTokenOwner`] unless the controller owns
    /// the current token, which is what makes late or duplicate messages
    /// harmless. The payload's expiry is ignored.
    fn inject<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        data: &TransferData,
    ) -> Result<TokenId> {
        let me = self.account();
        let assignable = self.core().config().assignable_roles;

        let label = data.normalized_label().map_err(|_| BridgeError::InvalidLabel {
            label: data.label.clone(),
            token_id: None,
        })?;
        if data.owner.is_zero() {
            return Err(BridgeError::InvalidOwner);
        }

        let token_id = registry.token_id_of(&label)?;
        if registry.owner_of(token_id)? != me {
            return Err(BridgeError::NotTokenOwner(token_id));
        }
        let resource = token_id.resource();

        registry.set_subregistry(me, token_id, data.subregistry)?;
        registry.set_resolver(me, token_id, data.resolver)?;
        registry.set_token_observer(me, token_id, TokenObserver::None)?;

        // Roles that followed the token in are not passed on.
        let held = registry.roles(resource, me)?;
        registry.renounce_roles(me, resource, held)?;
        registry.grant_roles(me, resource, data.owner, data.role_bitmap & assignable)?;
        registry.transfer(me, me, data.owner, token_id)?;

        registry.emit(Event::InjectionCompleted {
            token_id,
            label,
            owner: data.owner,
        })?;

        debug!(controller = %me, %token_id, owner = %data.owner, "injection completed");
        Ok(token_id)
    }

    /// Decode and apply a message delivered by an ejector.
    fn receive_message<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        caller: Account,
        bytes: &[u8],
    ) -> Result<Applied> {
        self.core().check_ejector(caller)?;

        match BridgeMessage::decode(bytes)? {
            BridgeMessage::Ejection(data) => self.apply_ejection(registry, &data).map(Applied::Injected),
            BridgeMessage::Renewal { token_id, expiry } => {
                let local = self.apply_renewal(registry, token_id, expiry)?;
                Ok(Applied::Renewed {
                    token_id: local,
                    expiry,
                })
            }
        }
    }
}
