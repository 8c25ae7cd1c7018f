//! Datastore trait: the abstract interface for registry persistence.
//!
//! The datastore holds records and nothing else. Every policy decision
//! (who may write, what an expiry means) belongs to the registry.

use namebridge_core::{Account, Entry, Event, ResourceId, RoleBitmap, RoleCounts};

use crate::error::Result;

/// Key-value persistence for name entries, role grants, the event log and
/// the bridge's ejection counters.
///
/// Methods are synchronous: each ledger operation runs as one sequential
/// step and never waits on I/O from the other ledger.
///
/// # Checkpoints
///
/// `begin` opens a checkpoint, `commit` keeps everything written since, and
/// `rollback` discards it. Checkpoints nest.
pub trait Datastore: Send {
    // ─────────────────────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the entry for a resource.
    fn get_entry(&self, resource: &ResourceId) -> Result<Option<Entry>>;

    /// Insert or replace the entry for a resource.
    fn put_entry(&mut self, resource: &ResourceId, entry: &Entry) -> Result<()>;

    /// Delete the entry for a resource. Missing entries are not an error.
    fn remove_entry(&mut self, resource: &ResourceId) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    /// Roles held by `account` on `resource` (empty if none).
    fn get_roles(&self, resource: &ResourceId, account: &Account) -> Result<RoleBitmap>;

    /// Replace the roles held by `account` on `resource`. An empty bitmap
    /// deletes the grant.
    fn put_roles(&mut self, resource: &ResourceId, account: &Account, roles: RoleBitmap)
        -> Result<()>;

    /// Every account holding at least one role on `resource`.
    fn role_holders(&self, resource: &ResourceId) -> Result<Vec<(Account, RoleBitmap)>>;

    /// Per-role holder counters for `resource`.
    fn get_role_counts(&self, resource: &ResourceId) -> Result<RoleCounts>;

    /// Replace the holder counters for `resource`.
    fn put_role_counts(&mut self, resource: &ResourceId, counts: &RoleCounts) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Operators
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `operator` may transfer every token of `owner`.
    fn is_operator(&self, owner: &Account, operator: &Account) -> Result<bool>;

    fn set_operator(&mut self, owner: &Account, operator: &Account, approved: bool)
        -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Event log
    // ─────────────────────────────────────────────────────────────────────────

    fn append_event(&mut self, event: &Event) -> Result<()>;

    /// Events with log index `>= offset`, oldest first.
    fn events_since(&self, offset: u64) -> Result<Vec<Event>>;

    fn event_count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bridge sequences
    // ─────────────────────────────────────────────────────────────────────────

    /// Number of ejections sent for `resource` (0 if none).
    fn get_ejection_seq(&self, resource: &ResourceId) -> Result<u64>;

    fn put_ejection_seq(&mut self, resource: &ResourceId, seq: u64) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoints
    // ─────────────────────────────────────────────────────────────────────────

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Extension trait for common datastore patterns.
pub trait DatastoreExt: Datastore {
    /// The full event log.
    fn events(&self) -> Result<Vec<Event>> {
        self.events_since(0)
    }
}

impl<D: Datastore + ?Sized> DatastoreExt for D {}
