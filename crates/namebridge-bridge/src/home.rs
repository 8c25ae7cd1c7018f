//! Home-side controller.
//!
//! Names originate on the home ledger. An inbound ejection is a name coming
//! back, so it is applied as a plain injection of a name this controller
//! still holds. Renewals happen here and are relayed outward.

use tracing::debug;

use namebridge_core::{Account, TokenId, TransferData};
use namebridge_registry::Registry;
use namebridge_store::Datastore;

use crate::controller::{BridgeController, ControllerCore};
use crate::error::{BridgeError, Result};
use crate::message::BridgeMessage;
use crate::outbox::Bridge;

pub struct HomeController {
    core: ControllerCore,
}

impl HomeController {
    pub fn new(core: ControllerCore) -> Self {
        Self { core }
    }
}

impl BridgeController for HomeController {
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
        self.inject(registry, data)
    }

    fn apply_renewal<D: Datastore>(
        &mut self,
        _registry: &mut Registry<D>,
        token_id: TokenId,
        _expiry: u64,
    ) -> Result<TokenId> {
        Err(BridgeError::RenewalNotSupported(token_id))
    }

    fn on_renew(
        &mut self,
        bridge: &mut dyn Bridge,
        caller: Account,
        token_id: TokenId,
        expiry: u64,
        renewed_by: Account,
    ) -> Result<()> {
        self.core.check_registry(caller)?;
        bridge.send_message(&BridgeMessage::Renewal { token_id, expiry }.encode()?)?;
        debug!(controller = %self.core.account(), %token_id, expiry, %renewed_by, "renewal relayed");
        Ok(())
    }
}
