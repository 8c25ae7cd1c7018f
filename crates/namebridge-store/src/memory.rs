//! In-memory implementation of the Datastore trait.
//!
//! Same semantics as SQLite but keeps everything in memory with no
//! persistence. Checkpoints keep an undo journal: every write records the
//! value it replaced, and rollback replays the journal backwards. The event
//! log only ever grows, so undoing it is a truncation.

use std::collections::{BTreeMap, BTreeSet};

use namebridge_core::{Account, Entry, Event, ResourceId, RoleBitmap, RoleCounts};

use crate::error::{Result, StoreError};
use crate::traits::Datastore;

/// In-memory datastore.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    /// Entries indexed by resource.
    entries: BTreeMap<ResourceId, Entry>,

    /// Role grants: (resource, account) -> roles.
    roles: BTreeMap<(ResourceId, Account), RoleBitmap>,

    /// Holder counters per resource.
    counts: BTreeMap<ResourceId, RoleCounts>,

    /// Operator approvals: (owner, operator).
    operators: BTreeSet<(Account, Account)>,

    /// Append-only event log.
    events: Vec<Event>,

    /// Ejections sent per resource.
    sequences: BTreeMap<ResourceId, u64>,

    /// One undo journal per open checkpoint, innermost last.
    checkpoints: Vec<Vec<Undo>>,
}

/// The previous value of one written key.
#[derive(Debug)]
enum Undo {
    Entry(ResourceId, Option<Entry>),
    Roles(ResourceId, Account, Option<RoleBitmap>),
    Counts(ResourceId, Option<RoleCounts>),
    Operator(Account, Account, bool),
    Events(usize),
    Sequence(ResourceId, Option<u64>),
}

impl MemoryDatastore {
    /// Create a new empty in-memory datastore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open checkpoints.
    pub fn depth(&self) -> usize {
        self.checkpoints.len()
    }

    fn journal(&mut self, undo: impl FnOnce(&Self) -> Undo) {
        if self.checkpoints.is_empty() {
            return;
        }
        let undo = undo(self);
        if let Some(frame) = self.checkpoints.last_mut() {
            frame.push(undo);
        }
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Entry(resource, Some(entry)) => {
                self.entries.insert(resource, entry);
            }
            Undo::Entry(resource, None) => {
                self.entries.remove(&resource);
            }
            Undo::Roles(resource, account, Some(roles)) => {
                self.roles.insert((resource, account), roles);
            }
            Undo::Roles(resource, account, None) => {
                self.roles.remove(&(resource, account));
            }
            Undo::Counts(resource, Some(counts)) => {
                self.counts.insert(resource, counts);
            }
            Undo::Counts(resource, None) => {
                self.counts.remove(&resource);
            }
            Undo::Operator(owner, operator, true) => {
                self.operators.insert((owner, operator));
            }
            Undo::Operator(owner, operator, false) => {
                self.operators.remove(&(owner, operator));
            }
            Undo::Events(len) => self.events.truncate(len),
            Undo::Sequence(resource, Some(seq)) => {
                self.sequences.insert(resource, seq);
            }
            Undo::Sequence(resource, None) => {
                self.sequences.remove(&resource);
            }
        }
    }
}

impl Datastore for MemoryDatastore {
    fn get_entry(&self, resource: &ResourceId) -> Result<Option<Entry>> {
        Ok(self.entries.get(resource).cloned())
    }

    fn put_entry(&mut self, resource: &ResourceId, entry: &Entry) -> Result<()> {
        self.journal(|s| Undo::Entry(*resource, s.entries.get(resource).cloned()));
        self.entries.insert(*resource, entry.clone());
        Ok(())
    }

    fn remove_entry(&mut self, resource: &ResourceId) -> Result<()> {
        self.journal(|s| Undo::Entry(*resource, s.entries.get(resource).cloned()));
        self.entries.remove(resource);
        Ok(())
    }

    fn get_roles(&self, resource: &ResourceId, account: &Account) -> Result<RoleBitmap> {
        Ok(self
            .roles
            .get(&(*resource, *account))
            .copied()
            .unwrap_or_default())
    }

    fn put_roles(
        &mut self,
        resource: &ResourceId,
        account: &Account,
        roles: RoleBitmap,
    ) -> Result<()> {
        let key = (*resource, *account);
        self.journal(|s| Undo::Roles(*resource, *account, s.roles.get(&key).copied()));
        if roles.is_empty() {
            self.roles.remove(&key);
        } else {
            self.roles.insert(key, roles);
        }
        Ok(())
    }

    fn role_holders(&self, resource: &ResourceId) -> Result<Vec<(Account, RoleBitmap)>> {
        Ok(self
            .roles
            .range((*resource, Account::ZERO)..)
            .take_while(|((r, _), _)| r == resource)
            .map(|((_, account), roles)| (*account, *roles))
            .collect())
    }

    fn get_role_counts(&self, resource: &ResourceId) -> Result<RoleCounts> {
        Ok(self.counts.get(resource).copied().unwrap_or_default())
    }

    fn put_role_counts(&mut self, resource: &ResourceId, counts: &RoleCounts) -> Result<()> {
        self.journal(|s| Undo::Counts(*resource, s.counts.get(resource).copied()));
        if counts.is_empty() {
            self.counts.remove(resource);
        } else {
            self.counts.insert(*resource, *counts);
        }
        Ok(())
    }

    fn is_operator(&self, owner: &Account, operator: &Account) -> Result<bool> {
        Ok(self.operators.contains(&(*owner, *operator)))
    }

    fn set_operator(&mut self, owner: &Account, operator: &Account, approved: bool) -> Result<()> {
        let key = (*owner, *operator);
        self.journal(|s| Undo::Operator(*owner, *operator, s.operators.contains(&key)));
        if approved {
            self.operators.insert(key);
        } else {
            self.operators.remove(&key);
        }
        Ok(())
    }

    fn append_event(&mut self, event: &Event) -> Result<()> {
        self.journal(|s| Undo::Events(s.events.len()));
        self.events.push(event.clone());
        Ok(())
    }

    fn events_since(&self, offset: u64) -> Result<Vec<Event>> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        Ok(self.events[start..].to_vec())
    }

    fn event_count(&self) -> Result<u64> {
        Ok(self.events.len() as u64)
    }

    fn get_ejection_seq(&self, resource: &ResourceId) -> Result<u64> {
        Ok(self.sequences.get(resource).copied().unwrap_or(0))
    }

    fn put_ejection_seq(&mut self, resource: &ResourceId, seq: u64) -> Result<()> {
        self.journal(|s| Undo::Sequence(*resource, s.sequences.get(resource).copied()));
        self.sequences.insert(*resource, seq);
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.checkpoints.push(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let frame = self.checkpoints.pop().ok_or(StoreError::NoCheckpoint)?;
        // An enclosing checkpoint must still be able to undo these writes.
        if let Some(parent) = self.checkpoints.last_mut() {
            parent.extend(frame);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let frame = self.checkpoints.pop().ok_or(StoreError::NoCheckpoint)?;
        for undo in frame.into_iter().rev() {
            self.undo(undo);
        }
        Ok(())
    }
}
