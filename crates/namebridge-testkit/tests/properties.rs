//! Property tests over whole ledgers.

use proptest::prelude::*;

use namebridge_bridge::BridgeError;
use namebridge_core::{RoleBitmap, TokenObserver, TransferData};
use namebridge_testkit::fixtures::{account, home_accounts, parties, BridgeFixture};
use namebridge_testkit::generators::{nonzero_account, role_subset, RoleLayout};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Ejection succeeds iff every critical role has exactly one holder.
    #[test]
    fn ejection_iff_critical_roles_unique(layout: RoleLayout) {
        let mut fixture = BridgeFixture::new().unwrap();
        let holders = parties(layout.grants.len());
        let owner = holders[0];

        let token = fixture.register_home("test", owner, layout.grants[0]).unwrap();
        for (holder, grant) in holders.iter().zip(&layout.grants).skip(1) {
            fixture
                .home
                .grant_roles(home_accounts().deployer, token.resource(), *holder, *grant)
                .unwrap();
        }

        let result = fixture.eject_home(owner, token, &TransferData::new("test", account(0x0a)));
        let expected = layout.exactly_one_each(RoleBitmap::CRITICAL);

        prop_assert_eq!(result.is_ok(), expected, "layout {:?}", layout.grants);
        match result {
            Ok(()) => {
                prop_assert_eq!(fixture.home.owner_of(token).unwrap(), home_accounts().controller);
            }
            Err(err) => {
                let is_uniqueness_error = matches!(
                    err.as_bridge(),
                    Some(BridgeError::TooManyRoleAssignees { .. })
                );
                prop_assert!(is_uniqueness_error, "unexpected error: {}", err);
                prop_assert_eq!(fixture.home.owner_of(token).unwrap(), owner);
                prop_assert!(fixture.home.outbox().is_empty());
            }
        }
    }

    /// A round trip always lands on the payload's owner with its fields.
    #[test]
    fn round_trip_restores_payload(
        away in nonzero_account(),
        back in nonzero_account(),
        subregistry in prop::option::of(nonzero_account()),
        resolver in prop::option::of(nonzero_account()),
        roles in role_subset(RoleBitmap::ALL),
    ) {
        let mut fixture = BridgeFixture::new().unwrap();
        let owner = account(0x01);
        let token = fixture.register_home("test", owner, RoleBitmap::CRITICAL).unwrap();

        fixture
            .eject_home(
                owner,
                token,
                &TransferData::new("test", away).with_roles(RoleBitmap::ASSIGNABLE),
            )
            .unwrap();
        prop_assert!(fixture.relay_home_to_remote().iter().all(|r| r.is_ok()));

        let remote_token = fixture.remote.token_id_of("test").unwrap();
        let data = TransferData {
            label: "test".into(),
            owner: back,
            subregistry,
            resolver,
            role_bitmap: roles,
            expiry: 0,
        };
        fixture.eject_remote(away, remote_token, &data).unwrap();
        prop_assert!(fixture.relay_remote_to_home().iter().all(|r| r.is_ok()));

        let entry = fixture.home.registry().entry(token.resource()).unwrap().unwrap();
        prop_assert_eq!(entry.owner, back);
        prop_assert_eq!(entry.subregistry, subregistry);
        prop_assert_eq!(entry.resolver.account(), resolver);
        prop_assert_eq!(entry.observer, TokenObserver::None);
        prop_assert_eq!(
            fixture.home.roles(token.resource(), back).unwrap(),
            roles & RoleBitmap::ASSIGNABLE
        );
    }
}
