//! Proptest generators for property-based testing.

use proptest::prelude::*;

use namebridge_core::{Account, RoleBitmap, TokenId, TransferData, MAX_LABEL_LEN};

/// Generate a random account.
pub fn account() -> impl Strategy<Value = Account> {
    any::<[u8; 20]>().prop_map(Account::from_bytes)
}

/// Generate a non-zero account.
pub fn nonzero_account() -> impl Strategy<Value = Account> {
    account().prop_filter("zero account", |a| !a.is_zero())
}

/// Generate a random token id.
pub fn token_id() -> impl Strategy<Value = TokenId> {
    any::<[u8; 32]>().prop_map(TokenId::from_bytes)
}

/// Generate any role bitmap.
pub fn role_bitmap() -> impl Strategy<Value = RoleBitmap> {
    any::<u32>().prop_map(RoleBitmap)
}

/// Generate a subset of `within`.
pub fn role_subset(within: RoleBitmap) -> impl Strategy<Value = RoleBitmap> {
    any::<u32>().prop_map(move |bits| RoleBitmap(bits) & within)
}

/// Generate a valid label.
pub fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate a label or a dotted name.
pub fn label_or_name() -> impl Strategy<Value = String> {
    (label(), prop::option::of("[a-z]{2,5}")).prop_map(|(label, tld)| match tld {
        Some(tld) => format!("{}.{}", label, tld),
        None => label,
    })
}

/// Generate a string that is not a valid label.
pub fn invalid_label() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(".eth".to_string()),
        Just("a".repeat(MAX_LABEL_LEN + 1)),
    ]
}

/// Generate a transfer payload.
pub fn transfer_data() -> impl Strategy<Value = TransferData> {
    (
        label_or_name(),
        nonzero_account(),
        prop::option::of(nonzero_account()),
        prop::option::of(nonzero_account()),
        role_bitmap(),
        any::<u64>(),
    )
        .prop_map(|(label, owner, subregistry, resolver, roles, expiry)| TransferData {
            label,
            owner,
            subregistry,
            resolver,
            role_bitmap: roles,
            expiry,
        })
}

/// How the critical roles on one name are spread over holders.
///
/// Holder `i` receives `grants[i]`. Holder 0 is the registrant.
#[derive(Debug, Clone)]
pub struct RoleLayout {
    pub grants: Vec<RoleBitmap>,
}

impl RoleLayout {
    /// Number of holders of the role at `index`.
    pub fn holders(&self, index: usize) -> usize {
        self.grants
            .iter()
            .filter(|g| g.contains(RoleBitmap(1u32 << index)))
            .count()
    }

    /// Whether every role in `roles` has exactly one holder.
    pub fn exactly_one_each(&self, roles: RoleBitmap) -> bool {
        roles.indices().all(|i| self.holders(i) == 1)
    }
}

impl Arbitrary for RoleLayout {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // Biased toward the interesting region: mostly one holder per role.
        let grant = prop_oneof![
            3 => Just(RoleBitmap::CRITICAL),
            2 => role_subset(RoleBitmap::CRITICAL),
            1 => role_subset(RoleBitmap::ALL),
        ];
        prop::collection::vec(grant, 1..4)
            .prop_map(|grants| RoleLayout { grants })
            .boxed()
    }
}
