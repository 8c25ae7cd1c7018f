//! Remote-side controller.
//!
//! The remote ledger only ever receives names. The first time a name
//! arrives it is seeded: registered to this controller with the expiry the
//! message carries, then injected like any other arrival. Renewals from home
//! extend the local expiry; renewals made here are not relayed.

use tracing::debug;

use namebridge_core::{Account, Event, TokenId, TransferData};
use namebridge_registry::{Registration, Registry};
use namebridge_store::Datastore;

use crate::controller::{BridgeController, ControllerCore};
use crate::error::{BridgeError, Result};
use crate::outbox::Bridge;

pub struct RemoteController {
    core: ControllerCore,
}

impl RemoteController {
    pub fn new(core: ControllerCore) -> Self {
        Self { core }
    }

    /// Materialize an inbound name on behalf of an ejector.
    pub fn complete_ejection<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        caller: Account,
        data: &TransferData,
    ) -> Result<TokenId> {
        self.core.check_ejector(caller)?;
        self.seed_and_inject(registry, data)
    }

    fn seed_and_inject<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        data: &TransferData,
    ) -> Result<TokenId> {
        let me = self.core.account();
        let label = data.normalized_label().map_err(|_| BridgeError::InvalidLabel {
            label: data.label.clone(),
            token_id: None,
        })?;

        let current = registry.token_id_of(&label)?;
        if registry.owner_of(current)?.is_zero() {
            let seeded = registry.register(me, Registration::new(label, me, data.expiry))?;
            debug!(controller = %me, token_id = %seeded, expiry = data.expiry, "name seeded");
        }

        self.inject(registry, data)
    }
}

impl BridgeController for RemoteController {
    fn core(&self) -> &ControllerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    fn apply_ejection<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        data: &TransferData,
    ) -> Result<TokenId> {
        self.seed_and_inject(registry, data)
    }

    /// Token versions differ between ledgers, so the renewal is matched to
    /// the local entry by resource.
    fn apply_renewal<D: Datastore>(
        &mut self,
        registry: &mut Registry<D>,
        token_id: TokenId,
        expiry: u64,
    ) -> Result<TokenId> {
        let me = self.core.account();
        let resource = token_id.resource();
        let entry = registry
            .entry(resource)?
            .ok_or(BridgeError::UnknownToken(token_id))?;
        let local = entry.token_id(resource);

        registry.renew(me, local, expiry)?;
        registry.emit(Event::RenewalSynced {
            token_id: local,
            expiry,
        })?;

        debug!(controller = %me, token_id = %local, expiry, "renewal synced");
        Ok(local)
    }

    fn on_renew(
        &mut self,
        _bridge: &mut dyn Bridge,
        caller: Account,
        token_id: TokenId,
        _expiry: u64,
        _renewed_by: Account,
    ) -> Result<()> {
        self.core.check_registry(caller)?;
        Err(BridgeError::RenewalNotSupported(token_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::*;
    use crate::controller::Applied;
    use crate::error::ErrorKind;
    use crate::message::BridgeMessage;
    use crate::outbox::Outbox;
    use namebridge_core::{ResolverSlot, RoleBitmap, TokenObserver};
    use namebridge_registry::RegistryError;

    fn target() -> Account {
        Account::from_bytes([0xaa; 20])
    }

    fn inbound() -> TransferData {
        TransferData::new("test", target())
            .with_resolver(Account::from_bytes([0x55; 20]))
            .with_roles(RoleBitmap::ALL)
            .with_expiry(NOW + 30 * DAY)
    }

    #[test]
    fn test_first_arrival_seeds_name() {
        let mut remote = RemoteController::new(core());
        let mut registry = registry();

        let token = remote
            .complete_ejection(&mut registry, ejector(), &inbound())
            .unwrap();

        let entry = registry.entry(token.resource()).unwrap().unwrap();
        assert_eq!(entry.owner, target());
        assert_eq!(entry.expiry, NOW + 30 * DAY);
        assert_eq!(entry.resolver, ResolverSlot::Set(Account::from_bytes([0x55; 20])));
        assert_eq!(entry.observer, TokenObserver::None);
        assert_eq!(
            registry.roles(token.resource(), target()).unwrap(),
            RoleBitmap::ASSIGNABLE
        );
    }

    #[test]
    fn test_live_foreign_entry_is_not_overwritten() {
        let mut remote = RemoteController::new(core());
        let mut registry = registry();
        registry
            .register(
                deployer(),
                Registration::new("test", user(), NOW + DAY),
            )
            .unwrap();

        let err = remote
            .complete_ejection(&mut registry, ejector(), &inbound())
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotTokenOwner(_)));
        assert_eq!(
            registry.name_info("test").unwrap().owner,
            user()
        );
    }

    #[test]
    fn test_returning_name_keeps_local_expiry() {
        let mut remote = RemoteController::new(core());
        let mut outbox = Outbox::new(controller());
        let mut registry = registry();

        let token = remote
            .complete_ejection(&mut registry, ejector(), &inbound())
            .unwrap();

        // Send it home and bring it back with a different expiry.
        registry.transfer(target(), target(), controller(), token).unwrap();
        remote
            .eject(&mut registry, &mut outbox, token, &TransferData::new("test", user()))
            .unwrap();
        let back = inbound().with_expiry(NOW + 365 * DAY);
        remote.complete_ejection(&mut registry, ejector(), &back).unwrap();

        assert_eq!(
            registry.entry(token.resource()).unwrap().unwrap().expiry,
            NOW + 30 * DAY
        );
    }

    #[test]
    fn test_renewal_extends_local_expiry() {
        let mut remote = RemoteController::new(core());
        let mut registry = registry();
        let token = remote
            .complete_ejection(&mut registry, ejector(), &inbound())
            .unwrap();

        // Home token id with a different version maps to the same entry.
        let home_token = TokenId::new(token.resource(), 7);
        let bytes = BridgeMessage::Renewal {
            token_id: home_token,
            expiry: NOW + 60 * DAY,
        }
        .encode()
        .unwrap();

        let applied = remote
            .receive_message(&mut registry, ejector(), &bytes)
            .unwrap();
        assert_eq!(
            applied,
            Applied::Renewed {
                token_id: token,
                expiry: NOW + 60 * DAY
            }
        );
        assert_eq!(
            registry.entry(token.resource()).unwrap().unwrap().expiry,
            NOW + 60 * DAY
        );

        // Replaying the same renewal cannot move expiry backwards.
        let err = remote
            .receive_message(&mut registry, ejector(), &bytes)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Registry(RegistryError::CannotReduceExpiration { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_renewal_for_unknown_name() {
        let mut remote = RemoteController::new(core());
        let mut registry = registry();
        let token = TokenId::new(namebridge_core::ResourceId::from_label("ghost").unwrap(), 0);

        let err = remote
            .apply_renewal(&mut registry, token, NOW + DAY)
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownToken(t) if t == token));
    }

    #[test]
    fn test_on_renew_not_supported() {
        let mut remote = RemoteController::new(core());
        let mut outbox = Outbox::new(controller());
        let token = TokenId::new(namebridge_core::ResourceId::from_label("test").unwrap(), 0);

        let err = remote
            .on_renew(&mut outbox, registry_account(), token, NOW, user())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert!(outbox.is_empty());
    }
}
