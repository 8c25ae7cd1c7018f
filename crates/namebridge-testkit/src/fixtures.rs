//! Test fixtures and helpers.
//!
//! A [`BridgeFixture`] is a home ledger and a remote ledger sharing one
//! relayer account, with helpers to move messages by hand.

use namebridge::{HomeLedger, Ledger, LedgerAccounts, LedgerConfig, RemoteLedger, Result};
use namebridge_bridge::Applied;
use namebridge_core::{Account, RoleBitmap, TokenId, TransferData};
use namebridge_registry::Registration;
use namebridge_store::MemoryDatastore;

pub const DAY: u64 = 86_400;

/// Clock value both ledgers start at.
pub const GENESIS: u64 = 1_700_000_000;

/// A deterministic account filled with `tag`.
pub fn account(tag: u8) -> Account {
    Account::from_bytes([tag; 20])
}

/// Accounts for the home ledger.
pub fn home_accounts() -> LedgerAccounts {
    LedgerAccounts {
        deployer: account(0xd0),
        registry: account(0xe0),
        controller: account(0xc0),
    }
}

/// Accounts for the remote ledger.
pub fn remote_accounts() -> LedgerAccounts {
    LedgerAccounts {
        deployer: account(0xd1),
        registry: account(0xe1),
        controller: account(0xc1),
    }
}

/// Two ledgers joined by a hand-driven relay.
pub struct BridgeFixture {
    pub home: HomeLedger<MemoryDatastore>,
    pub remote: RemoteLedger<MemoryDatastore>,
    /// Holds the ejector role on both controllers.
    pub relayer: Account,
}

impl BridgeFixture {
    pub fn new() -> Result<Self> {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Result<Self> {
        let relayer = account(0xe7);

        let mut home = Ledger::home(MemoryDatastore::new(), config.clone(), home_accounts())?;
        home.set_timestamp(GENESIS);
        home.grant_ejector(home_accounts().deployer, relayer)?;

        let mut remote = Ledger::remote(MemoryDatastore::new(), config, remote_accounts())?;
        remote.set_timestamp(GENESIS);
        remote.grant_ejector(remote_accounts().deployer, relayer)?;

        Ok(Self {
            home,
            remote,
            relayer,
        })
    }

    /// Register `label` on the home ledger, expiring a day from now.
    pub fn register_home(&mut self, label: &str, owner: Account, roles: RoleBitmap) -> Result<TokenId> {
        let expiry = self.home.timestamp() + DAY;
        self.home.register(
            home_accounts().deployer,
            Registration::new(label, owner, expiry).with_roles(roles),
        )
    }

    /// Send a home name to the home controller.
    pub fn eject_home(&mut self, owner: Account, token_id: TokenId, data: &TransferData) -> Result<()> {
        let controller = home_accounts().controller;
        self.home
            .safe_transfer_from(owner, owner, controller, token_id, Some(data))
    }

    /// Send a remote name to the remote controller.
    pub fn eject_remote(&mut self, owner: Account, token_id: TokenId, data: &TransferData) -> Result<()> {
        let controller = remote_accounts().controller;
        self.remote
            .safe_transfer_from(owner, owner, controller, token_id, Some(data))
    }

    /// Deliver everything in the home outbox to the remote ledger.
    pub fn relay_home_to_remote(&mut self) -> Vec<Result<Applied>> {
        let relayer = self.relayer;
        self.home
            .drain_outbox()
            .into_iter()
            .map(|envelope| self.remote.deliver(relayer, &envelope.payload))
            .collect()
    }

    /// Deliver everything in the remote outbox to the home ledger.
    pub fn relay_remote_to_home(&mut self) -> Vec<Result<Applied>> {
        let relayer = self.relayer;
        self.remote
            .drain_outbox()
            .into_iter()
            .map(|envelope| self.home.deliver(relayer, &envelope.payload))
            .collect()
    }

    /// Move both clocks forward.
    pub fn advance(&mut self, seconds: u64) {
        let home = self.home.timestamp() + seconds;
        let remote = self.remote.timestamp() + seconds;
        self.home.set_timestamp(home);
        self.remote.set_timestamp(remote);
    }
}

/// Distinct accounts for multi-party tests.
pub fn parties(count: usize) -> Vec<Account> {
    (0..count)
        .map(|i| {
            let mut bytes = [0u8; 20];
            bytes[0] = 0x10;
            bytes[1] = i as u8;
            Account::from_bytes(bytes)
        })
        .collect()
}
