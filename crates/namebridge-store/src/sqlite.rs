//! SQLite implementation of the Datastore trait.
//!
//! Records are stored as CBOR blobs next to a few indexed columns.
//! Checkpoints map onto SQLite savepoints, so they nest the same way the
//! in-memory store's snapshots do.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use namebridge_core::{Account, Entry, Event, ResourceId, RoleBitmap, RoleCounts};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Datastore;

/// SQLite-based datastore.
pub struct SqliteDatastore {
    conn: Connection,
    /// Number of open savepoints.
    depth: usize,
}

impl SqliteDatastore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self { conn, depth: 0 })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self { conn, depth: 0 })
    }

    fn savepoint_name(depth: usize) -> String {
        format!("checkpoint_{}", depth)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn account_from_blob(bytes: &[u8]) -> Result<Account> {
    Account::try_from(bytes)
        .map_err(|_| StoreError::InvalidData(format!("account of {} bytes", bytes.len())))
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Datastore for SqliteDatastore {
    fn get_entry(&self, resource: &ResourceId) -> Result<Option<Entry>> {
        let record: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT record FROM entries WHERE resource = ?1",
                params![resource.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;

        record.map(|bytes| decode(&bytes)).transpose()
    }

    fn put_entry(&mut self, resource: &ResourceId, entry: &Entry) -> Result<()> {
        let record = encode(entry)?;
        self.conn.execute(
            "INSERT INTO entries (resource, label, token_version, owner, expiry, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(resource) DO UPDATE SET
                label = excluded.label,
                token_version = excluded.token_version,
                owner = excluded.owner,
                expiry = excluded.expiry,
                record = excluded.record",
            params![
                resource.as_bytes().as_slice(),
                entry.label,
                entry.token_version,
                entry.owner.as_bytes().as_slice(),
                clamp_i64(entry.expiry),
                record,
            ],
        )?;
        Ok(())
    }

    fn remove_entry(&mut self, resource: &ResourceId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM entries WHERE resource = ?1",
            params![resource.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    fn get_roles(&self, resource: &ResourceId, account: &Account) -> Result<RoleBitmap> {
        let bits: Option<u32> = self
            .conn
            .query_row(
                "SELECT bitmap FROM roles WHERE resource = ?1 AND account = ?2",
                params![resource.as_bytes().as_slice(), account.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(RoleBitmap(bits.unwrap_or(0)))
    }

    fn put_roles(
        &mut self,
        resource: &ResourceId,
        account: &Account,
        roles: RoleBitmap,
    ) -> Result<()> {
        if roles.is_empty() {
            self.conn.execute(
                "DELETE FROM roles WHERE resource = ?1 AND account = ?2",
                params![resource.as_bytes().as_slice(), account.as_bytes().as_slice()],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO roles (resource, account, bitmap) VALUES (?1, ?2, ?3)
                 ON CONFLICT(resource, account) DO UPDATE SET bitmap = excluded.bitmap",
                params![
                    resource.as_bytes().as_slice(),
                    account.as_bytes().as_slice(),
                    roles.bits(),
                ],
            )?;
        }
        Ok(())
    }

    fn role_holders(&self, resource: &ResourceId) -> Result<Vec<(Account, RoleBitmap)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT account, bitmap FROM roles WHERE resource = ?1 ORDER BY account")?;
        let rows = stmt
            .query_map(params![resource.as_bytes().as_slice()], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(account, bits)| Ok((account_from_blob(&account)?, RoleBitmap(bits))))
            .collect()
    }

    fn get_role_counts(&self, resource: &ResourceId) -> Result<RoleCounts> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT counts FROM role_counts WHERE resource = ?1",
                params![resource.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;

        match blob {
            Some(bytes) => decode(&bytes),
            None => Ok(RoleCounts::default()),
        }
    }

    fn put_role_counts(&mut self, resource: &ResourceId, counts: &RoleCounts) -> Result<()> {
        if counts.is_empty() {
            self.conn.execute(
                "DELETE FROM role_counts WHERE resource = ?1",
                params![resource.as_bytes().as_slice()],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO role_counts (resource, counts) VALUES (?1, ?2)
                 ON CONFLICT(resource) DO UPDATE SET counts = excluded.counts",
                params![resource.as_bytes().as_slice(), encode(counts)?],
            )?;
        }
        Ok(())
    }

    fn is_operator(&self, owner: &Account, operator: &Account) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM operators WHERE owner = ?1 AND operator = ?2",
                params![owner.as_bytes().as_slice(), operator.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn set_operator(&mut self, owner: &Account, operator: &Account, approved: bool) -> Result<()> {
        if approved {
            self.conn.execute(
                "INSERT OR IGNORE INTO operators (owner, operator) VALUES (?1, ?2)",
                params![owner.as_bytes().as_slice(), operator.as_bytes().as_slice()],
            )?;
        } else {
            self.conn.execute(
                "DELETE FROM operators WHERE owner = ?1 AND operator = ?2",
                params![owner.as_bytes().as_slice(), operator.as_bytes().as_slice()],
            )?;
        }
        Ok(())
    }

    fn append_event(&mut self, event: &Event) -> Result<()> {
        let index = clamp_i64(self.event_count()?);
        let token_id = event.token_id().map(|t| t.as_bytes().to_vec());
        self.conn.execute(
            "INSERT INTO events (log_index, token_id, record) VALUES (?1, ?2, ?3)",
            params![index, token_id, encode(event)?],
        )?;
        Ok(())
    }

    fn events_since(&self, offset: u64) -> Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM events WHERE log_index >= ?1 ORDER BY log_index")?;
        let records = stmt
            .query_map(params![clamp_i64(offset)], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        records.iter().map(|bytes| decode(bytes)).collect()
    }

    fn event_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn get_ejection_seq(&self, resource: &ResourceId) -> Result<u64> {
        let seq: Option<i64> = self
            .conn
            .query_row(
                "SELECT seq FROM bridge_sequences WHERE resource = ?1",
                params![resource.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(seq.unwrap_or(0).max(0) as u64)
    }

    fn put_ejection_seq(&mut self, resource: &ResourceId, seq: u64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bridge_sequences (resource, seq) VALUES (?1, ?2)
             ON CONFLICT(resource) DO UPDATE SET seq = excluded.seq",
            params![resource.as_bytes().as_slice(), clamp_i64(seq)],
        )?;
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.depth += 1;
        let name = Self::savepoint_name(self.depth);
        if let Err(e) = self.conn.execute_batch(&format!("SAVEPOINT {}", name)) {
            self.depth -= 1;
            return Err(e.into());
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(StoreError::NoCheckpoint);
        }
        let name = Self::savepoint_name(self.depth);
        self.conn.execute_batch(&format!("RELEASE {}", name))?;
        self.depth -= 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(StoreError::NoCheckpoint);
        }
        let name = Self::savepoint_name(self.depth);
        self.conn
            .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}", name = name))?;
        self.depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namebridge_core::{ResolverSlot, TokenId, TokenObserver};

    fn make_entry(owner: Account) -> Entry {
        Entry {
            label: "test".into(),
            token_version: 2,
            owner,
            subregistry: Some(Account::from_bytes([9; 20])),
            resolver: ResolverSlot::InFlight,
            observer: TokenObserver::Controller(Account::from_bytes([7; 20])),
            expiry: 1_736_870_400,
        }
    }

    #[test]
    fn test_sqlite_entry_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let resource = ResourceId::from_label("test").unwrap();
        let entry = make_entry(Account::from_bytes([1; 20]));

        {
            let mut store = SqliteDatastore::open(&path).unwrap();
            store.put_entry(&resource, &entry).unwrap();
        }

        let store = SqliteDatastore::open(&path).unwrap();
        assert_eq!(store.get_entry(&resource).unwrap(), Some(entry));
    }

    #[test]
    fn test_sqlite_roles_and_counts() {
        let mut store = SqliteDatastore::open_memory().unwrap();
        let resource = ResourceId::from_label("test").unwrap();
        let alice = Account::from_bytes([1; 20]);

        store
            .put_roles(&resource, &alice, RoleBitmap::RENEW | RoleBitmap::BURN)
            .unwrap();
        assert_eq!(
            store.get_roles(&resource, &alice).unwrap(),
            RoleBitmap::RENEW | RoleBitmap::BURN
        );

        let mut counts = RoleCounts::default();
        counts.add(RoleBitmap::RENEW | RoleBitmap::BURN);
        store.put_role_counts(&resource, &counts).unwrap();
        assert_eq!(store.get_role_counts(&resource).unwrap(), counts);

        store.put_roles(&resource, &alice, RoleBitmap::EMPTY).unwrap();
        assert!(store.role_holders(&resource).unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_savepoint_rollback() {
        let mut store = SqliteDatastore::open_memory().unwrap();
        let resource = ResourceId::from_label("test").unwrap();
        let owner = Account::from_bytes([1; 20]);

        store.begin().unwrap();
        store.put_entry(&resource, &make_entry(owner)).unwrap();
        store
            .append_event(&Event::Transfer {
                token_id: TokenId::new(resource, 2),
                from: Account::ZERO,
                to: owner,
            })
            .unwrap();

        store.begin().unwrap();
        store.remove_entry(&resource).unwrap();
        store.rollback().unwrap();
        assert!(store.get_entry(&resource).unwrap().is_some());

        store.rollback().unwrap();
        assert!(store.get_entry(&resource).unwrap().is_none());
        assert_eq!(store.event_count().unwrap(), 0);
        assert!(matches!(store.rollback(), Err(StoreError::NoCheckpoint)));
    }

    #[test]
    fn test_sqlite_events_in_order() {
        let mut store = SqliteDatastore::open_memory().unwrap();
        let owner = Account::from_bytes([1; 20]);
        for approved in [true, false, true] {
            store
                .append_event(&Event::ApprovalForAll {
                    owner,
                    operator: owner,
                    approved,
                })
                .unwrap();
        }

        let tail = store.events_since(1).unwrap();
        assert_eq!(tail.len(), 2);
        assert!(matches!(tail[0], Event::ApprovalForAll { approved: false, .. }));
    }

    #[test]
    fn test_sqlite_ejection_seq_persists_and_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let resource = ResourceId::from_label("test").unwrap();

        {
            let mut store = SqliteDatastore::open(&path).unwrap();
            assert_eq!(store.get_ejection_seq(&resource).unwrap(), 0);
            store.put_ejection_seq(&resource, 1).unwrap();
            store.begin().unwrap();
            store.put_ejection_seq(&resource, 2).unwrap();
            store.rollback().unwrap();
        }

        let store = SqliteDatastore::open(&path).unwrap();
        assert_eq!(store.get_ejection_seq(&resource).unwrap(), 1);
    }

    mod props {
        use super::*;
        use crate::memory::MemoryDatastore;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn backends_agree_on_role_grants(
                grants in prop::collection::vec((0u8..4, 0u8..4, any::<u32>()), 1..20)
            ) {
                let mut sqlite = SqliteDatastore::open_memory().unwrap();
                let mut memory = MemoryDatastore::new();

                for (r, a, bits) in &grants {
                    let resource = ResourceId::from_bytes([*r; 32]);
                    let account = Account::from_bytes([*a; 20]);
                    sqlite.put_roles(&resource, &account, RoleBitmap(*bits)).unwrap();
                    memory.put_roles(&resource, &account, RoleBitmap(*bits)).unwrap();
                }

                for r in 0u8..4 {
                    let resource = ResourceId::from_bytes([r; 32]);
                    prop_assert_eq!(
                        sqlite.role_holders(&resource).unwrap(),
                        memory.role_holders(&resource).unwrap()
                    );
                }
            }
        }
    }
}
