//! Ledgers over SQLite files.

use anyhow::Result;
use tempfile::TempDir;

use namebridge::bridge::ReplayGuard;
use namebridge::store::{MemoryDatastore, SqliteDatastore};
use namebridge::{
    Account, Ledger, LedgerAccounts, LedgerConfig, NameStatus, Registration, RegistryConfig,
    RoleBitmap, TransferData,
};

const NOW: u64 = 1_700_000_000;
const DAY: u64 = 86_400;

fn accounts() -> LedgerAccounts {
    LedgerAccounts {
        deployer: Account::from_bytes([0xd0; 20]),
        registry: Account::from_bytes([0xee; 20]),
        controller: Account::from_bytes([0xc0; 20]),
    }
}

fn remote_accounts() -> LedgerAccounts {
    LedgerAccounts {
        deployer: Account::from_bytes([0xd1; 20]),
        registry: Account::from_bytes([0xe1; 20]),
        controller: Account::from_bytes([0xc1; 20]),
    }
}

fn config() -> LedgerConfig {
    LedgerConfig {
        registry: RegistryConfig {
            genesis_timestamp: NOW,
            ..RegistryConfig::default()
        },
        ..LedgerConfig::default()
    }
}

#[test]
fn test_in_flight_name_survives_restart() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new()?;
    let path = dir.path().join("home.db");
    let owner = Account::from_bytes([0x01; 20]);
    let target = Account::from_bytes([0x0a; 20]);
    let relayer = Account::from_bytes([0xe7; 20]);
    let data = TransferData::new("test", target);

    let token = {
        let mut ledger = Ledger::home(SqliteDatastore::open(&path)?, config(), accounts())?;
        let token = ledger.register(
            accounts().deployer,
            Registration::new("test", owner, NOW + DAY).with_roles(RoleBitmap::CRITICAL),
        )?;
        ledger.safe_transfer_from(owner, owner, accounts().controller, token, Some(&data))?;
        token
    };

    let mut ledger = Ledger::home(SqliteDatastore::open(&path)?, config(), accounts())?;
    assert_eq!(ledger.name_info("test")?.status, NameStatus::InFlight);
    assert_eq!(ledger.owner_of(token)?, accounts().controller);

    // Ejectors are controller state and must be granted again.
    assert!(ledger.complete_injection(relayer, &data).is_err());
    ledger.grant_ejector(accounts().deployer, relayer)?;
    ledger.complete_injection(relayer, &data)?;
    assert_eq!(ledger.owner_of(token)?, target);
    Ok(())
}

#[test]
fn test_failed_step_leaves_file_untouched() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("home.db");
    let owner = Account::from_bytes([0x01; 20]);
    let second = Account::from_bytes([0x02; 20]);

    let mut ledger = Ledger::home(SqliteDatastore::open(&path)?, config(), accounts())?;
    let token = ledger.register(
        accounts().deployer,
        Registration::new("test", owner, NOW + DAY).with_roles(RoleBitmap::CRITICAL),
    )?;
    ledger.grant_roles(
        accounts().deployer,
        token.resource(),
        second,
        RoleBitmap::SET_RESOLVER,
    )?;
    let events_before = ledger.events()?.len();

    let err = ledger
        .safe_transfer_from(
            owner,
            owner,
            accounts().controller,
            token,
            Some(&TransferData::new("test", second)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), namebridge::ErrorKind::InvariantViolation);
    drop(ledger);

    let ledger = Ledger::home(SqliteDatastore::open(&path)?, config(), accounts())?;
    assert_eq!(ledger.owner_of(token)?, owner);
    assert_eq!(ledger.events()?.len(), events_before);
    Ok(())
}

#[test]
fn test_ejection_sequence_survives_restart() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("home.db");
    let owner = Account::from_bytes([0x01; 20]);
    let away = Account::from_bytes([0x0a; 20]);
    let late = Account::from_bytes([0x0c; 20]);
    let relayer = Account::from_bytes([0xe7; 20]);

    let mut remote = Ledger::remote(MemoryDatastore::new(), config(), remote_accounts())?;
    remote.grant_ejector(remote_accounts().deployer, relayer)?;
    // Stands in for the remote relay, which outlives the home process.
    let mut guard = ReplayGuard::new();

    let token = {
        let mut home = Ledger::home(SqliteDatastore::open(&path)?, config(), accounts())?;
        home.grant_ejector(accounts().deployer, relayer)?;
        let token = home.register(
            accounts().deployer,
            Registration::new("test", owner, NOW + DAY).with_roles(RoleBitmap::CRITICAL),
        )?;

        home.safe_transfer_from(
            owner,
            owner,
            accounts().controller,
            token,
            Some(&TransferData::new("test", away).with_roles(RoleBitmap::ASSIGNABLE)),
        )?;
        for envelope in home.drain_outbox() {
            assert!(guard.admits(&envelope));
            remote.deliver(relayer, &envelope.payload)?;
            guard.record(&envelope);
        }

        let remote_token = remote.token_id_of("test")?;
        remote.safe_transfer_from(
            away,
            away,
            remote_accounts().controller,
            remote_token,
            Some(&TransferData::new("test", owner).with_roles(RoleBitmap::ASSIGNABLE)),
        )?;
        for envelope in remote.drain_outbox() {
            home.deliver(relayer, &envelope.payload)?;
        }
        assert_eq!(home.owner_of(token)?, owner);
        token
    };

    let mut home = Ledger::home(SqliteDatastore::open(&path)?, config(), accounts())?;
    assert_eq!(home.ejection_seq(token.resource())?, 1);
    home.safe_transfer_from(
        owner,
        owner,
        accounts().controller,
        token,
        Some(&TransferData::new("test", late)),
    )?;

    let envelopes = home.drain_outbox();
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].ejection_seq, 2);
    assert!(guard.admits(&envelopes[0]));
    remote.deliver(relayer, &envelopes[0].payload)?;
    assert_eq!(remote.owner_of(remote.token_id_of("test")?)?, late);
    Ok(())
}
