//! Role bitmaps and per-role assignee counters.
//!
//! Base roles occupy bits 0..16. The admin counterpart of a base role is the
//! same bit shifted left by 16. Holding `admin(r)` is what allows granting or
//! revoking `r`; admin bits administer themselves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Number of role slots in a bitmap.
pub const ROLE_SLOTS: usize = 32;

/// Offset between a base role and its admin role.
const ADMIN_SHIFT: u32 = 16;

/// Set of permission flags held by an account on a resource.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleBitmap(pub u32);

impl RoleBitmap {
    pub const EMPTY: Self = Self(0);

    pub const REGISTRAR: Self = Self(1 << 0);
    pub const RENEW: Self = Self(1 << 1);
    pub const SET_SUBREGISTRY: Self = Self(1 << 2);
    pub const SET_RESOLVER: Self = Self(1 << 3);
    pub const SET_TOKEN_OBSERVER: Self = Self(1 << 4);
    pub const BURN: Self = Self(1 << 5);
    pub const CAN_TRANSFER: Self = Self(1 << 6);

    pub const REGISTRAR_ADMIN: Self = Self(Self::REGISTRAR.0 << ADMIN_SHIFT);
    pub const RENEW_ADMIN: Self = Self(Self::RENEW.0 << ADMIN_SHIFT);
    pub const SET_SUBREGISTRY_ADMIN: Self = Self(Self::SET_SUBREGISTRY.0 << ADMIN_SHIFT);
    pub const SET_RESOLVER_ADMIN: Self = Self(Self::SET_RESOLVER.0 << ADMIN_SHIFT);
    pub const SET_TOKEN_OBSERVER_ADMIN: Self = Self(Self::SET_TOKEN_OBSERVER.0 << ADMIN_SHIFT);
    pub const BURN_ADMIN: Self = Self(Self::BURN.0 << ADMIN_SHIFT);
    pub const TRANSFER_ADMIN: Self = Self(Self::CAN_TRANSFER.0 << ADMIN_SHIFT);

    /// Every defined base role.
    pub const ALL_BASE: Self = Self(
        Self::REGISTRAR.0
            | Self::RENEW.0
            | Self::SET_SUBREGISTRY.0
            | Self::SET_RESOLVER.0
            | Self::SET_TOKEN_OBSERVER.0
            | Self::BURN.0
            | Self::CAN_TRANSFER.0,
    );

    /// Every defined role, base and admin.
    pub const ALL: Self = Self(Self::ALL_BASE.0 | (Self::ALL_BASE.0 << ADMIN_SHIFT));

    /// Roles whose multiple holders could race an in-flight ejection.
    pub const CRITICAL: Self = Self(
        Self::SET_RESOLVER.0
            | Self::SET_SUBREGISTRY.0
            | Self::SET_SUBREGISTRY_ADMIN.0
            | Self::SET_TOKEN_OBSERVER.0
            | Self::SET_TOKEN_OBSERVER_ADMIN.0
            | Self::TRANSFER_ADMIN.0,
    );

    /// Roles a receiving controller will grant from an inbound message.
    pub const ASSIGNABLE: Self = Self(
        Self::SET_RESOLVER.0
            | Self::SET_RESOLVER_ADMIN.0
            | Self::SET_SUBREGISTRY.0
            | Self::SET_SUBREGISTRY_ADMIN.0
            | Self::SET_TOKEN_OBSERVER.0
            | Self::SET_TOKEN_OBSERVER_ADMIN.0
            | Self::CAN_TRANSFER.0
            | Self::TRANSFER_ADMIN.0,
    );

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// The roles whose holders may grant or revoke `self`.
    pub const fn admin(self) -> Self {
        let base = self.0 & 0xffff;
        let admin = self.0 & 0xffff_0000;
        Self((base << ADMIN_SHIFT) | admin)
    }

    /// Iterate the indices of set bits, lowest first.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..ROLE_SLOTS).filter(move |i| self.0 & (1u32 << *i) != 0)
    }
}

impl BitOr for RoleBitmap {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for RoleBitmap {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RoleBitmap {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl BitAndAssign for RoleBitmap {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for RoleBitmap {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for RoleBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleBitmap({:#010x})", self.0)
    }
}

impl fmt::Display for RoleBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Number of distinct accounts holding each role on a resource.
///
/// Maintained incrementally on every grant and revoke, so a query over any
/// role subset touches only the queried slots.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts(pub [u32; ROLE_SLOTS]);

impl RoleCounts {
    /// Count of holders for a single role slot.
    pub fn get(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Record that an account gained `roles` it did not hold before.
    pub fn add(&mut self, roles: RoleBitmap) {
        for i in roles.indices() {
            self.0[i] = self.0[i].saturating_add(1);
        }
    }

    /// Record that an account lost `roles` it held before.
    pub fn remove(&mut self, roles: RoleBitmap) {
        for i in roles.indices() {
            self.0[i] = self.0[i].saturating_sub(1);
        }
    }

    /// Project the counters onto `roles`.
    pub fn query(&self, roles: RoleBitmap) -> AssigneeCount {
        let mut counts = [0u32; ROLE_SLOTS];
        for i in roles.indices() {
            counts[i] = self.0[i];
        }
        AssigneeCount {
            counts: RoleCounts(counts),
            mask: roles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }
}

impl fmt::Debug for RoleCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.0
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| **c != 0),
            )
            .finish()
    }
}

/// Result of an assignee-count query: counts for the queried roles and the
/// mask isolating exactly those roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssigneeCount {
    pub counts: RoleCounts,
    pub mask: RoleBitmap,
}

impl AssigneeCount {
    /// Holders of the role at `index`, zero if the role was not queried.
    pub fn count(&self, index: usize) -> u32 {
        self.counts.get(index)
    }

    /// Whether every queried role has exactly one holder.
    pub fn exactly_one_each(&self) -> bool {
        self.mask.indices().all(|i| self.counts.get(i) == 1)
    }

    /// Queried roles whose holder count is not exactly one.
    pub fn offending(&self) -> RoleBitmap {
        let bits = self
            .mask
            .indices()
            .filter(|&i| self.counts.get(i) != 1)
            .fold(0u32, |acc, i| acc | (1u32 << i));
        RoleBitmap(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_mapping() {
        assert_eq!(RoleBitmap::SET_RESOLVER.admin(), RoleBitmap::SET_RESOLVER_ADMIN);
        assert_eq!(RoleBitmap::CAN_TRANSFER.admin(), RoleBitmap::TRANSFER_ADMIN);
        assert_eq!(
            RoleBitmap::SET_RESOLVER_ADMIN.admin(),
            RoleBitmap::SET_RESOLVER_ADMIN
        );
        assert_eq!(
            (RoleBitmap::RENEW | RoleBitmap::BURN_ADMIN).admin(),
            RoleBitmap::RENEW_ADMIN | RoleBitmap::BURN_ADMIN
        );
    }

    #[test]
    fn test_assignable_excludes_escalation_roles() {
        for role in [
            RoleBitmap::REGISTRAR,
            RoleBitmap::REGISTRAR_ADMIN,
            RoleBitmap::RENEW,
            RoleBitmap::RENEW_ADMIN,
            RoleBitmap::BURN,
            RoleBitmap::BURN_ADMIN,
        ] {
            assert!(!RoleBitmap::ASSIGNABLE.intersects(role));
        }
        assert!(RoleBitmap::ASSIGNABLE.contains(RoleBitmap::CRITICAL));
    }

    #[test]
    fn test_counts_query_isolates_mask() {
        let mut counts = RoleCounts::default();
        counts.add(RoleBitmap::SET_RESOLVER | RoleBitmap::RENEW);
        counts.add(RoleBitmap::SET_RESOLVER);

        let result = counts.query(RoleBitmap::RENEW);
        assert_eq!(result.mask, RoleBitmap::RENEW);
        assert!(result.exactly_one_each());
        assert_eq!(result.count(3), 0); // SET_RESOLVER not queried

        let result = counts.query(RoleBitmap::SET_RESOLVER | RoleBitmap::RENEW);
        assert!(!result.exactly_one_each());
        assert_eq!(result.offending(), RoleBitmap::SET_RESOLVER);
    }

    #[test]
    fn test_counts_zero_holders_is_not_unique() {
        let counts = RoleCounts::default();
        let result = counts.query(RoleBitmap::CRITICAL);
        assert!(!result.exactly_one_each());
        assert_eq!(result.offending(), RoleBitmap::CRITICAL);
    }

    #[test]
    fn test_remove_saturates() {
        let mut counts = RoleCounts::default();
        counts.remove(RoleBitmap::BURN);
        assert!(counts.is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn admin_is_idempotent(bits in any::<u32>()) {
                let roles = RoleBitmap(bits);
                prop_assert_eq!(roles.admin().admin(), roles.admin());
            }

            #[test]
            fn grant_then_revoke_restores_counts(a in any::<u32>(), b in any::<u32>()) {
                let mut counts = RoleCounts::default();
                counts.add(RoleBitmap(a));
                let before = counts;
                counts.add(RoleBitmap(b));
                counts.remove(RoleBitmap(b));
                prop_assert_eq!(counts, before);
            }

            #[test]
            fn single_holder_is_unique_for_any_subset(held in any::<u32>(), query in any::<u32>()) {
                let mut counts = RoleCounts::default();
                counts.add(RoleBitmap(held));
                let result = counts.query(RoleBitmap(query));
                prop_assert_eq!(result.exactly_one_each(), RoleBitmap(held).contains(RoleBitmap(query)));
            }
        }
    }
}
