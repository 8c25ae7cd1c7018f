//! The Registry: ownership ledger for names and their role grants.
//!
//! Every write goes through a permission check against the caller's roles on
//! the name's resource, or on [`ResourceId::ROOT`] for registry-wide grants.
//! Ownership is tied to a [`TokenId`]; the version inside it bumps when an
//! expired name is registered again, so the previous token stops resolving
//! to an owner while role grants keyed by the resource can persist.

use serde::{Deserialize, Serialize};
use tracing::debug;

use namebridge_core::{
    label_of, normalize_label, Account, AssigneeCount, Entry, Event, ResolverSlot, ResourceId,
    RoleBitmap, TokenId, TokenObserver,
};
use namebridge_store::{Datastore, DatastoreExt};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Parameters for [`Registry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub label: String,
    pub owner: Account,
    pub subregistry: Option<Account>,
    pub resolver: Option<Account>,
    /// Roles granted to `owner` on the name's resource.
    pub roles: RoleBitmap,
    pub expiry: u64,
}

impl Registration {
    pub fn new(label: impl Into<String>, owner: Account, expiry: u64) -> Self {
        Self {
            label: label.into(),
            owner,
            subregistry: None,
            resolver: None,
            roles: RoleBitmap::EMPTY,
            expiry,
        }
    }

    pub fn with_subregistry(mut self, subregistry: Account) -> Self {
        self.subregistry = Some(subregistry);
        self
    }

    pub fn with_resolver(mut self, resolver: Account) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_roles(mut self, roles: RoleBitmap) -> Self {
        self.roles = roles;
        self
    }
}

/// Result of a successful renewal.
///
/// Carries the entry's token observer so the host can notify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewOutcome {
    pub token_id: TokenId,
    pub expiry: u64,
    pub renewed_by: Account,
    pub observer: TokenObserver,
}

/// Lifecycle state of a name as seen from this ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameStatus {
    /// Never registered, or burned.
    Available,
    Registered,
    /// Registered once, lapsed, and free to register again.
    Expired,
    /// Held by a bridge controller while a cross-ledger message is in flight.
    InFlight,
}

/// Everything the registry knows about a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInfo {
    pub label: String,
    pub status: NameStatus,
    pub token_id: TokenId,
    /// Live owner, or the zero account.
    pub owner: Account,
    pub subregistry: Option<Account>,
    pub resolver: ResolverSlot,
    pub observer: TokenObserver,
    /// Absent for names that were never registered.
    pub expiry: Option<u64>,
}

/// The permissioned registry.
pub struct Registry<D: Datastore> {
    store: D,
    config: RegistryConfig,
    /// Block clock in seconds.
    now: u64,
}

impl<D: Datastore> Registry<D> {
    /// Create a registry over `store`, granting every role on
    /// [`ResourceId::ROOT`] to `deployer` unless it already holds them.
    pub fn new(store: D, config: RegistryConfig, deployer: Account) -> Result<Self> {
        if deployer.is_zero() {
            return Err(RegistryError::InvalidOwner);
        }

        let now = config.genesis_timestamp;
        let mut registry = Self { store, config, now };
        registry.grant_unchecked(ResourceId::ROOT, deployer, RoleBitmap::ALL, deployer)?;
        Ok(registry)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &D {
        &self.store
    }

    /// Mutable access to the store, for checkpoint control by the host.
    pub fn store_mut(&mut self) -> &mut D {
        &mut self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clock
    // ─────────────────────────────────────────────────────────────────────────

    pub fn timestamp(&self) -> u64 {
        self.now
    }

    /// Advance (or rewind, in tests) the block clock.
    pub fn set_timestamp(&mut self, now: u64) {
        self.now = now;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Names
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a name.
    ///
    /// Fails if a live registration exists. Registering an expired name
    /// bumps the token version; with
    /// [`RegistryConfig::clear_roles_on_reregister`] the old grants on the
    /// resource are revoked first.
    pub fn register(&mut self, caller: Account, registration: Registration) -> Result<TokenId> {
        let label = normalize_label(&registration.label)?;
        let resource = ResourceId::from_label(&label)?;
        self.check_roles(resource, caller, RoleBitmap::REGISTRAR)?;

        if registration.owner.is_zero() {
            return Err(RegistryError::InvalidOwner);
        }
        if registration.expiry <= self.now {
            return Err(RegistryError::CannotSetPastExpiration {
                expiry: registration.expiry,
                now: self.now,
            });
        }

        let version = match self.store.get_entry(&resource)? {
            Some(existing) if !existing.is_expired(self.now) => {
                return Err(RegistryError::NameAlreadyRegistered(
                    existing.token_id(resource),
                ));
            }
            Some(existing) => {
                let next = existing
                    .token_version
                    .checked_add(1)
                    .ok_or(RegistryError::TokenVersionExhausted(resource))?;
                if self.config.clear_roles_on_reregister {
                    self.clear_resource_roles(resource, caller)?;
                }
                next
            }
            None => 0,
        };

        let entry = Entry {
            label: label.clone(),
            token_version: version,
            owner: registration.owner,
            subregistry: registration.subregistry.filter(|a| !a.is_zero()),
            resolver: ResolverSlot::from_ref(registration.resolver),
            observer: TokenObserver::None,
            expiry: registration.expiry,
        };
        self.store.put_entry(&resource, &entry)?;

        let token_id = entry.token_id(resource);
        self.store.append_event(&Event::NameRegistered {
            token_id,
            label: label.clone(),
            owner: entry.owner,
            expiry: entry.expiry,
        })?;
        self.store.append_event(&Event::Transfer {
            token_id,
            from: Account::ZERO,
            to: entry.owner,
        })?;
        self.grant_unchecked(resource, entry.owner, registration.roles, caller)?;

        debug!(%token_id, %label, owner = %entry.owner, expiry = entry.expiry, "name registered");
        Ok(token_id)
    }

    /// Extend a live registration. Requires `RENEW`.
    pub fn renew(&mut self, caller: Account, token_id: TokenId, expiry: u64) -> Result<RenewOutcome> {
        let mut entry = self.live_entry(token_id)?;
        let resource = token_id.resource();
        self.check_roles(resource, caller, RoleBitmap::RENEW)?;

        if expiry <= entry.expiry {
            return Err(RegistryError::CannotReduceExpiration {
                token_id,
                old: entry.expiry,
                new: expiry,
            });
        }

        entry.expiry = expiry;
        self.store.put_entry(&resource, &entry)?;
        self.store.append_event(&Event::NameRenewed {
            token_id,
            expiry,
            renewed_by: caller,
        })?;

        debug!(%token_id, expiry, renewed_by = %caller, "name renewed");
        Ok(RenewOutcome {
            token_id,
            expiry,
            renewed_by: caller,
            observer: entry.observer,
        })
    }

    /// Destroy a name: removes the entry and every grant on its resource.
    /// Requires `BURN`. Expired names can be burned too.
    pub fn burn(&mut self, caller: Account, token_id: TokenId) -> Result<()> {
        let resource = token_id.resource();
        let entry = self
            .current_entry(token_id)?
            .ok_or(RegistryError::TokenNotFound(token_id))?;
        self.check_roles(resource, caller, RoleBitmap::BURN)?;

        self.clear_resource_roles(resource, caller)?;
        self.store.remove_entry(&resource)?;
        self.store.append_event(&Event::Transfer {
            token_id,
            from: entry.owner,
            to: Account::ZERO,
        })?;
        self.store.append_event(&Event::NameBurned {
            token_id,
            burned_by: caller,
        })?;

        debug!(%token_id, burned_by = %caller, "name burned");
        Ok(())
    }

    pub fn set_subregistry(
        &mut self,
        caller: Account,
        token_id: TokenId,
        subregistry: Option<Account>,
    ) -> Result<()> {
        let mut entry = self.live_entry(token_id)?;
        let resource = token_id.resource();
        self.check_roles(resource, caller, RoleBitmap::SET_SUBREGISTRY)?;

        entry.subregistry = subregistry.filter(|a| !a.is_zero());
        self.store.put_entry(&resource, &entry)?;
        self.store.append_event(&Event::SubregistryUpdated {
            token_id,
            subregistry: entry.subregistry,
        })?;
        Ok(())
    }

    /// Point the name at a resolver, or clear it with `None`.
    pub fn set_resolver(
        &mut self,
        caller: Account,
        token_id: TokenId,
        resolver: Option<Account>,
    ) -> Result<()> {
        self.write_resolver(caller, token_id, ResolverSlot::from_ref(resolver))
    }

    /// Park the resolver slot in the in-flight state.
    ///
    /// Only the token's owner can do this, and it still needs `SET_RESOLVER`.
    /// This is the one way to reach [`ResolverSlot::InFlight`].
    pub fn mark_in_flight(&mut self, caller: Account, token_id: TokenId) -> Result<()> {
        let entry = self.live_entry(token_id)?;
        if entry.owner != caller {
            return Err(RegistryError::IncorrectOwner {
                token_id,
                from: caller,
            });
        }
        self.write_resolver(caller, token_id, ResolverSlot::InFlight)
    }

    fn write_resolver(
        &mut self,
        caller: Account,
        token_id: TokenId,
        resolver: ResolverSlot,
    ) -> Result<()> {
        let mut entry = self.live_entry(token_id)?;
        let resource = token_id.resource();
        self.check_roles(resource, caller, RoleBitmap::SET_RESOLVER)?;

        entry.resolver = resolver;
        self.store.put_entry(&resource, &entry)?;
        self.store
            .append_event(&Event::ResolverUpdated { token_id, resolver })?;
        Ok(())
    }

    pub fn set_token_observer(
        &mut self,
        caller: Account,
        token_id: TokenId,
        observer: TokenObserver,
    ) -> Result<()> {
        let mut entry = self.live_entry(token_id)?;
        let resource = token_id.resource();
        self.check_roles(resource, caller, RoleBitmap::SET_TOKEN_OBSERVER)?;

        entry.observer = observer;
        self.store.put_entry(&resource, &entry)?;
        self.store
            .append_event(&Event::TokenObserverUpdated { token_id, observer })?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ownership
    // ─────────────────────────────────────────────────────────────────────────

    /// Move a live token from `from` to `to`.
    ///
    /// The caller must be `from` or one of its approved operators. Grants
    /// held by `from` on the resource move to `to` with the token.
    pub fn transfer(
        &mut self,
        caller: Account,
        from: Account,
        to: Account,
        token_id: TokenId,
    ) -> Result<()> {
        let mut entry = self.live_entry(token_id)?;
        let resource = token_id.resource();

        if entry.owner != from {
            return Err(RegistryError::IncorrectOwner { token_id, from });
        }
        if caller != from && !self.store.is_operator(&from, &caller)? {
            return Err(RegistryError::NotOwnerOrOperator { token_id, caller });
        }
        if to.is_zero() {
            return Err(RegistryError::InvalidRecipient);
        }
        if from == to {
            return Ok(());
        }

        entry.owner = to;
        self.store.put_entry(&resource, &entry)?;
        self.store
            .append_event(&Event::Transfer { token_id, from, to })?;

        let held = self.store.get_roles(&resource, &from)?;
        if !held.is_empty() {
            self.revoke_unchecked(resource, from, held, from)?;
            self.grant_unchecked(resource, to, held, from)?;
        }

        debug!(%token_id, %from, %to, roles = %held, "token transferred");
        Ok(())
    }

    pub fn set_approval_for_all(
        &mut self,
        owner: Account,
        operator: Account,
        approved: bool,
    ) -> Result<()> {
        if owner == operator {
            return Err(RegistryError::InvalidOperator(operator));
        }
        self.store.set_operator(&owner, &operator, approved)?;
        self.store.append_event(&Event::ApprovalForAll {
            owner,
            operator,
            approved,
        })?;
        Ok(())
    }

    pub fn is_approved_for_all(&self, owner: Account, operator: Account) -> Result<bool> {
        Ok(self.store.is_operator(&owner, &operator)?)
    }

    /// Owner of a token, or the zero account if the token is stale or expired.
    pub fn owner_of(&self, token_id: TokenId) -> Result<Account> {
        Ok(self
            .current_entry(token_id)?
            .filter(|entry| !entry.is_expired(self.now))
            .map(|entry| entry.owner)
            .unwrap_or(Account::ZERO))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `roles` to `account`. The caller must hold the admin role of
    /// every role being granted.
    pub fn grant_roles(
        &mut self,
        caller: Account,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
    ) -> Result<()> {
        self.check_roles(resource, caller, roles.admin())?;
        if account.is_zero() {
            return Err(RegistryError::InvalidRecipient);
        }
        self.grant_unchecked(resource, account, roles, caller)?;
        Ok(())
    }

    /// Revoke `roles` from `account`. Same admin requirement as granting.
    pub fn revoke_roles(
        &mut self,
        caller: Account,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
    ) -> Result<()> {
        self.check_roles(resource, caller, roles.admin())?;
        self.revoke_unchecked(resource, account, roles, caller)?;
        Ok(())
    }

    /// Give up roles the caller holds. Needs no admin role.
    pub fn renounce_roles(
        &mut self,
        caller: Account,
        resource: ResourceId,
        roles: RoleBitmap,
    ) -> Result<()> {
        self.revoke_unchecked(resource, caller, roles, caller)?;
        Ok(())
    }

    /// Roles granted to `account` directly on `resource`, excluding root grants.
    pub fn roles(&self, resource: ResourceId, account: Account) -> Result<RoleBitmap> {
        Ok(self.store.get_roles(&resource, &account)?)
    }

    /// Whether `account` holds all of `roles` on `resource` or on root.
    pub fn has_roles(
        &self,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
    ) -> Result<bool> {
        let mut held = self.store.get_roles(&resource, &account)?;
        if !resource.is_root() {
            held |= self.store.get_roles(&ResourceId::ROOT, &account)?;
        }
        Ok(held.contains(roles))
    }

    /// Holder counts for each role in `roles` on `resource`.
    ///
    /// Root grants are never counted.
    pub fn assignee_count(&self, resource: ResourceId, roles: RoleBitmap) -> Result<AssigneeCount> {
        Ok(self.store.get_role_counts(&resource)?.query(roles))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Current token id for a label or dotted name. Version 0 if the name
    /// has never been registered.
    pub fn token_id_of(&self, label: &str) -> Result<TokenId> {
        let resource = ResourceId::from_label(&label_of(label)?)?;
        let version = self
            .store
            .get_entry(&resource)?
            .map(|entry| entry.token_version)
            .unwrap_or(0);
        Ok(TokenId::new(resource, version))
    }

    pub fn entry(&self, resource: ResourceId) -> Result<Option<Entry>> {
        Ok(self.store.get_entry(&resource)?)
    }

    /// Full lookup of a label or dotted name.
    pub fn name_info(&self, label: &str) -> Result<NameInfo> {
        let label = label_of(label)?;
        let resource = ResourceId::from_label(&label)?;

        let info = match self.store.get_entry(&resource)? {
            None => NameInfo {
                label,
                status: NameStatus::Available,
                token_id: TokenId::new(resource, 0),
                owner: Account::ZERO,
                subregistry: None,
                resolver: ResolverSlot::Unset,
                observer: TokenObserver::None,
                expiry: None,
            },
            Some(entry) => {
                let expired = entry.is_expired(self.now);
                let status = if expired {
                    NameStatus::Expired
                } else if entry.resolver.is_in_flight() {
                    NameStatus::InFlight
                } else {
                    NameStatus::Registered
                };
                NameInfo {
                    label,
                    status,
                    token_id: entry.token_id(resource),
                    owner: if expired { Account::ZERO } else { entry.owner },
                    subregistry: entry.subregistry,
                    resolver: entry.resolver,
                    observer: entry.observer,
                    expiry: Some(entry.expiry),
                }
            }
        };
        Ok(info)
    }

    /// The full event log.
    pub fn events(&self) -> Result<Vec<Event>> {
        Ok(self.store.events()?)
    }

    pub fn events_since(&self, offset: u64) -> Result<Vec<Event>> {
        Ok(self.store.events_since(offset)?)
    }

    /// Append an event produced outside the registry, such as by a bridge
    /// controller, to the same log.
    pub fn emit(&mut self, event: Event) -> Result<()> {
        Ok(self.store.append_event(&event)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn check_roles(&self, resource: ResourceId, account: Account, roles: RoleBitmap) -> Result<()> {
        if self.has_roles(resource, account, roles)? {
            Ok(())
        } else {
            Err(RegistryError::Unauthorized {
                resource,
                roles,
                account,
            })
        }
    }

    /// Entry matching the token's version, expired or not.
    fn current_entry(&self, token_id: TokenId) -> Result<Option<Entry>> {
        Ok(self
            .store
            .get_entry(&token_id.resource())?
            .filter(|entry| entry.token_version == token_id.version()))
    }

    fn live_entry(&self, token_id: TokenId) -> Result<Entry> {
        let entry = self
            .current_entry(token_id)?
            .ok_or(RegistryError::TokenNotFound(token_id))?;
        if entry.is_expired(self.now) {
            return Err(RegistryError::NameExpired(token_id));
        }
        Ok(entry)
    }

    /// Add `roles` to `account`'s grant, counting only bits it gains.
    fn grant_unchecked(
        &mut self,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
        by: Account,
    ) -> Result<RoleBitmap> {
        let current = self.store.get_roles(&resource, &account)?;
        let added = roles.difference(current);
        if added.is_empty() {
            return Ok(added);
        }

        self.store.put_roles(&resource, &account, current | added)?;
        if !resource.is_root() {
            let mut counts = self.store.get_role_counts(&resource)?;
            counts.add(added);
            self.store.put_role_counts(&resource, &counts)?;
        }
        self.store.append_event(&Event::RolesGranted {
            resource,
            account,
            roles: added,
            granted_by: by,
        })?;
        Ok(added)
    }

    /// Remove `roles` from `account`'s grant, counting only bits it loses.
    fn revoke_unchecked(
        &mut self,
        resource: ResourceId,
        account: Account,
        roles: RoleBitmap,
        by: Account,
    ) -> Result<RoleBitmap> {
        let current = self.store.get_roles(&resource, &account)?;
        let removed = current & roles;
        if removed.is_empty() {
            return Ok(removed);
        }

        self.store
            .put_roles(&resource, &account, current.difference(removed))?;
        if !resource.is_root() {
            let mut counts = self.store.get_role_counts(&resource)?;
            counts.remove(removed);
            self.store.put_role_counts(&resource, &counts)?;
        }
        self.store.append_event(&Event::RolesRevoked {
            resource,
            account,
            roles: removed,
            revoked_by: by,
        })?;
        Ok(removed)
    }

    fn clear_resource_roles(&mut self, resource: ResourceId, by: Account) -> Result<()> {
        for (account, roles) in self.store.role_holders(&resource)? {
            self.revoke_unchecked(resource, account, roles, by)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namebridge_store::{MemoryDatastore, SqliteDatastore};

    const DAY: u64 = 86_400;

    fn deployer() -> Account {
        Account::from_bytes([0xd0; 20])
    }

    fn alice() -> Account {
        Account::from_bytes([0xa1; 20])
    }

    fn bob() -> Account {
        Account::from_bytes([0xb0; 20])
    }

    fn registry() -> Registry<MemoryDatastore> {
        let mut registry =
            Registry::new(MemoryDatastore::new(), RegistryConfig::default(), deployer()).unwrap();
        registry.set_timestamp(1_000);
        registry
    }

    fn register_test(registry: &mut Registry<MemoryDatastore>, roles: RoleBitmap) -> TokenId {
        let expiry = registry.timestamp() + DAY;
        registry
            .register(
                deployer(),
                Registration::new("test", alice(), expiry).with_roles(roles),
            )
            .unwrap()
    }

    #[test]
    fn test_register_grants_roles_and_counts() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::CRITICAL);

        assert_eq!(registry.owner_of(token).unwrap(), alice());
        assert_eq!(
            registry.roles(token.resource(), alice()).unwrap(),
            RoleBitmap::CRITICAL
        );
        assert!(registry
            .assignee_count(token.resource(), RoleBitmap::CRITICAL)
            .unwrap()
            .exactly_one_each());
    }

    #[test]
    fn test_register_requires_registrar() {
        let mut registry = registry();
        let result = registry.register(alice(), Registration::new("test", alice(), 5_000));
        assert!(matches!(
            result,
            Err(RegistryError::Unauthorized { roles, .. }) if roles == RoleBitmap::REGISTRAR
        ));
    }

    #[test]
    fn test_register_live_name_fails() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::EMPTY);
        let result = registry.register(deployer(), Registration::new("TEST", bob(), 5_000));
        assert!(matches!(result, Err(RegistryError::NameAlreadyRegistered(t)) if t == token));
    }

    #[test]
    fn test_register_rejects_past_expiry_and_zero_owner() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(deployer(), Registration::new("test", alice(), 1_000)),
            Err(RegistryError::CannotSetPastExpiration { .. })
        ));
        assert!(matches!(
            registry.register(deployer(), Registration::new("test", Account::ZERO, 5_000)),
            Err(RegistryError::InvalidOwner)
        ));
        assert!(matches!(
            registry.register(deployer(), Registration::new("a.b", alice(), 5_000)),
            Err(RegistryError::Core(_))
        ));
    }

    #[test]
    fn test_reregister_after_expiry_bumps_version_and_clears_roles() {
        let mut registry = registry();
        let old = register_test(&mut registry, RoleBitmap::SET_RESOLVER);

        registry.set_timestamp(1_000 + DAY);
        assert_eq!(registry.owner_of(old).unwrap(), Account::ZERO);

        let new = registry
            .register(
                deployer(),
                Registration::new("test", bob(), 1_000 + 2 * DAY),
            )
            .unwrap();

        assert_eq!(new.resource(), old.resource());
        assert_eq!(new.version(), old.version() + 1);
        assert_eq!(registry.owner_of(new).unwrap(), bob());
        assert_eq!(registry.owner_of(old).unwrap(), Account::ZERO);
        assert!(registry.roles(new.resource(), alice()).unwrap().is_empty());
        assert_eq!(
            registry
                .assignee_count(new.resource(), RoleBitmap::SET_RESOLVER)
                .unwrap()
                .count(3),
            0
        );
    }

    #[test]
    fn test_reregister_refuses_exhausted_version() {
        let mut registry = registry();
        let old = register_test(&mut registry, RoleBitmap::EMPTY);
        let resource = old.resource();

        let mut entry = registry.entry(resource).unwrap().unwrap();
        entry.token_version = u32::MAX;
        registry.store_mut().put_entry(&resource, &entry).unwrap();
        registry.set_timestamp(1_000 + DAY);

        let result = registry.register(deployer(), Registration::new("test", bob(), 1_000 + 2 * DAY));
        assert!(matches!(result, Err(RegistryError::TokenVersionExhausted(r)) if r == resource));
        assert_eq!(
            registry.entry(resource).unwrap().unwrap().token_version,
            u32::MAX
        );
    }

    #[test]
    fn test_reregister_can_keep_roles() {
        let config = RegistryConfig {
            clear_roles_on_reregister: false,
            genesis_timestamp: 1_000,
        };
        let mut registry = Registry::new(MemoryDatastore::new(), config, deployer()).unwrap();
        let old = register_test(&mut registry, RoleBitmap::SET_RESOLVER);

        registry.set_timestamp(1_000 + DAY);
        registry
            .register(deployer(), Registration::new("test", bob(), 1_000 + 2 * DAY))
            .unwrap();

        assert_eq!(
            registry.roles(old.resource(), alice()).unwrap(),
            RoleBitmap::SET_RESOLVER
        );
    }

    #[test]
    fn test_renew_extends_and_reports_observer() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::RENEW | RoleBitmap::SET_TOKEN_OBSERVER);
        let watcher = Account::from_bytes([0xcc; 20]);
        registry
            .set_token_observer(alice(), token, TokenObserver::Controller(watcher))
            .unwrap();

        let outcome = registry.renew(alice(), token, 1_000 + 2 * DAY).unwrap();
        assert_eq!(outcome.expiry, 1_000 + 2 * DAY);
        assert_eq!(outcome.renewed_by, alice());
        assert_eq!(outcome.observer, TokenObserver::Controller(watcher));
    }

    #[test]
    fn test_renew_must_move_forward() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::RENEW);
        let expiry = 1_000 + DAY;

        assert!(matches!(
            registry.renew(alice(), token, expiry),
            Err(RegistryError::CannotReduceExpiration { old, new, .. }) if old == expiry && new == expiry
        ));
        assert!(matches!(
            registry.renew(bob(), token, expiry + 1),
            Err(RegistryError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_transfer_moves_roles() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::CRITICAL);

        registry.transfer(alice(), alice(), bob(), token).unwrap();

        assert_eq!(registry.owner_of(token).unwrap(), bob());
        assert!(registry.roles(token.resource(), alice()).unwrap().is_empty());
        assert_eq!(
            registry.roles(token.resource(), bob()).unwrap(),
            RoleBitmap::CRITICAL
        );
        assert!(registry
            .assignee_count(token.resource(), RoleBitmap::CRITICAL)
            .unwrap()
            .exactly_one_each());
    }

    #[test]
    fn test_transfer_requires_owner_or_operator() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::EMPTY);

        assert!(matches!(
            registry.transfer(bob(), alice(), bob(), token),
            Err(RegistryError::NotOwnerOrOperator { .. })
        ));
        assert!(matches!(
            registry.transfer(bob(), bob(), alice(), token),
            Err(RegistryError::IncorrectOwner { .. })
        ));
        assert!(matches!(
            registry.transfer(alice(), alice(), Account::ZERO, token),
            Err(RegistryError::InvalidRecipient)
        ));

        registry.set_approval_for_all(alice(), bob(), true).unwrap();
        assert!(registry.is_approved_for_all(alice(), bob()).unwrap());
        assert!(!registry.is_approved_for_all(bob(), alice()).unwrap());
        registry.transfer(bob(), alice(), bob(), token).unwrap();
        assert_eq!(registry.owner_of(token).unwrap(), bob());

        registry.set_approval_for_all(alice(), bob(), false).unwrap();
        assert!(!registry.is_approved_for_all(alice(), bob()).unwrap());
    }

    #[test]
    fn test_grant_requires_admin() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::SET_RESOLVER_ADMIN);
        let resource = token.resource();

        registry
            .grant_roles(alice(), resource, bob(), RoleBitmap::SET_RESOLVER)
            .unwrap();
        assert!(registry
            .has_roles(resource, bob(), RoleBitmap::SET_RESOLVER)
            .unwrap());

        assert!(matches!(
            registry.grant_roles(alice(), resource, bob(), RoleBitmap::BURN),
            Err(RegistryError::Unauthorized { roles, .. }) if roles == RoleBitmap::BURN_ADMIN
        ));

        registry
            .revoke_roles(alice(), resource, bob(), RoleBitmap::SET_RESOLVER)
            .unwrap();
        assert!(registry.roles(resource, bob()).unwrap().is_empty());
    }

    #[test]
    fn test_root_grants_apply_but_never_count() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::SET_RESOLVER);

        registry
            .grant_roles(deployer(), ResourceId::ROOT, bob(), RoleBitmap::SET_RESOLVER)
            .unwrap();
        assert!(registry
            .has_roles(token.resource(), bob(), RoleBitmap::SET_RESOLVER)
            .unwrap());
        assert!(registry
            .assignee_count(token.resource(), RoleBitmap::SET_RESOLVER)
            .unwrap()
            .exactly_one_each());
    }

    #[test]
    fn test_duplicate_grant_counts_once() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::SET_RESOLVER_ADMIN);
        let resource = token.resource();

        for _ in 0..3 {
            registry
                .grant_roles(alice(), resource, bob(), RoleBitmap::SET_RESOLVER)
                .unwrap();
        }
        assert_eq!(
            registry
                .assignee_count(resource, RoleBitmap::SET_RESOLVER)
                .unwrap()
                .count(3),
            1
        );
    }

    #[test]
    fn test_mark_in_flight_requires_owner() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::SET_RESOLVER);

        registry
            .grant_roles(deployer(), ResourceId::ROOT, bob(), RoleBitmap::SET_RESOLVER)
            .unwrap();
        assert!(matches!(
            registry.mark_in_flight(bob(), token),
            Err(RegistryError::IncorrectOwner { .. })
        ));

        registry.mark_in_flight(alice(), token).unwrap();
        assert_eq!(registry.name_info("test").unwrap().status, NameStatus::InFlight);
    }

    #[test]
    fn test_burn_removes_entry_and_grants() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::BURN | RoleBitmap::SET_RESOLVER);

        registry.burn(alice(), token).unwrap();

        assert_eq!(registry.owner_of(token).unwrap(), Account::ZERO);
        assert!(registry.entry(token.resource()).unwrap().is_none());
        assert!(registry
            .assignee_count(token.resource(), RoleBitmap::ALL)
            .unwrap()
            .counts
            .is_empty());
        assert_eq!(registry.name_info("test").unwrap().status, NameStatus::Available);
    }

    #[test]
    fn test_name_info_accepts_full_names() {
        let mut registry = registry();
        let resolver = Account::from_bytes([0x55; 20]);
        let token = registry
            .register(
                deployer(),
                Registration::new("test", alice(), 1_000 + DAY).with_resolver(resolver),
            )
            .unwrap();

        let info = registry.name_info("Test.eth").unwrap();
        assert_eq!(info.status, NameStatus::Registered);
        assert_eq!(info.token_id, token);
        assert_eq!(info.owner, alice());
        assert_eq!(info.resolver, ResolverSlot::Set(resolver));
        assert_eq!(registry.token_id_of("test.eth").unwrap(), token);

        registry.set_timestamp(1_000 + DAY);
        let info = registry.name_info("test").unwrap();
        assert_eq!(info.status, NameStatus::Expired);
        assert_eq!(info.owner, Account::ZERO);
    }

    #[test]
    fn test_setters_require_roles_and_emit_events() {
        let mut registry = registry();
        let token = register_test(&mut registry, RoleBitmap::SET_SUBREGISTRY);
        let sub = Account::from_bytes([0x66; 20]);

        let before = registry.store().event_count().unwrap();
        registry.set_subregistry(alice(), token, Some(sub)).unwrap();
        assert!(matches!(
            registry.set_resolver(alice(), token, Some(sub)),
            Err(RegistryError::Unauthorized { .. })
        ));

        let events = registry.events_since(before).unwrap();
        assert_eq!(
            events,
            vec![Event::SubregistryUpdated {
                token_id: token,
                subregistry: Some(sub)
            }]
        );
    }

    #[test]
    fn test_sqlite_backed_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let token = {
            let store = SqliteDatastore::open(&path).unwrap();
            let mut registry = Registry::new(store, RegistryConfig::default(), deployer()).unwrap();
            registry
                .register(deployer(), Registration::new("test", alice(), 5_000))
                .unwrap()
        };

        let store = SqliteDatastore::open(&path).unwrap();
        let registry = Registry::new(store, RegistryConfig::default(), deployer()).unwrap();
        assert_eq!(registry.owner_of(token).unwrap(), alice());
        // Reopening does not grant the deployer's roles a second time.
        let grants = registry
            .events()
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e, Event::RolesGranted { resource, .. } if resource.is_root()))
            .count();
        assert_eq!(grants, 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn holder(i: u8) -> Account {
            Account::from_bytes([i + 1; 20])
        }

        proptest! {
            #[test]
            fn counts_match_holders(
                ops in prop::collection::vec((any::<bool>(), 0u8..5, any::<u32>()), 1..40)
            ) {
                let mut registry = registry();
                let token = register_test(&mut registry, RoleBitmap::EMPTY);
                let resource = token.resource();

                for (grant, who, bits) in ops {
                    let roles = RoleBitmap(bits) & RoleBitmap::ALL;
                    if grant {
                        registry.grant_roles(deployer(), resource, holder(who), roles).unwrap();
                    } else {
                        registry.revoke_roles(deployer(), resource, holder(who), roles).unwrap();
                    }
                }

                let holders = registry.store().role_holders(&resource).unwrap();
                let counts = registry.assignee_count(resource, RoleBitmap::ALL).unwrap();
                for index in RoleBitmap::ALL.indices() {
                    let expected = holders
                        .iter()
                        .filter(|(_, roles)| roles.bits() & (1u32 << index) != 0)
                        .count() as u32;
                    prop_assert_eq!(counts.count(index), expected);
                }
            }
        }
    }
}
