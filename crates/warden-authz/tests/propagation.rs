//! Propagation properties over arbitrary grants.

use std::collections::BTreeSet;

use proptest::prelude::*;
use warden_authz::{
    direct_permissions, propagated_permissions, propagates_to, EntityTypeWithPermission,
    NamespaceScope, PrincipalPermissions,
};
use warden_core::{EntityId, EntityType, Permission, SYSTEM_NAMESPACE};

fn arb_permission() -> impl Strategy<Value = Permission> {
    (0..Permission::ALL.len()).prop_map(|i| Permission::ALL[i])
}

fn arb_permissions() -> impl Strategy<Value = BTreeSet<Permission>> {
    prop::collection::btree_set(arb_permission(), 1..6)
}

fn arb_namespace() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_filter("not the system namespace", |ns| ns != SYSTEM_NAMESPACE)
}

/// Every Namespace-type permission, everywhere.
fn namespace_superuser() -> PrincipalPermissions {
    PrincipalPermissions::new().with_grant(
        &NamespaceScope::All,
        Permission::ALL
            .iter()
            .map(|p| EntityTypeWithPermission::new(EntityType::Namespace, *p)),
    )
}

fn child_of(namespace: &str, entity_type: EntityType) -> EntityId {
    EntityId::new(entity_type, Some(namespace), ["child"]).unwrap()
}

fn arb_child_type() -> impl Strategy<Value = EntityType> {
    prop::sample::select(vec![
        EntityType::Application,
        EntityType::Program,
        EntityType::Dataset,
        EntityType::DatasetModule,
        EntityType::DatasetType,
        EntityType::Artifact,
        EntityType::SecureKey,
        EntityType::Profile,
    ])
}

proptest! {
    #[test]
    fn system_namespace_never_propagates(
        entity_type in arb_child_type(),
        requested in arb_permissions(),
    ) {
        let entity = child_of(SYSTEM_NAMESPACE, entity_type);
        let propagated = propagated_permissions(&entity, &requested, &namespace_superuser());
        prop_assert!(propagated.is_empty());
    }

    #[test]
    fn unscoped_entities_never_propagate(
        entity_type in prop::sample::select(vec![
            EntityType::Instance,
            EntityType::SystemService,
            EntityType::KerberosPrincipal,
        ]),
        requested in arb_permissions(),
    ) {
        let entity = EntityId::new(entity_type, None, ["x"]).unwrap();
        prop_assert_eq!(entity.owning_namespace(), SYSTEM_NAMESPACE);
        prop_assert!(propagated_permissions(&entity, &requested, &namespace_superuser()).is_empty());
    }

    #[test]
    fn secure_types_never_propagate(
        namespace in arb_namespace(),
        secure in prop::sample::select(vec![EntityType::SecureKey, EntityType::Profile]),
        requested in arb_permissions(),
    ) {
        let entity = child_of(&namespace, secure);
        prop_assert!(propagated_permissions(&entity, &requested, &namespace_superuser()).is_empty());
    }

    #[test]
    fn namespace_grant_propagates_to_ordinary_children(
        namespace in arb_namespace(),
        entity_type in arb_child_type().prop_filter("inherits", |t| propagates_to(*t)),
        requested in arb_permissions(),
    ) {
        let entity = child_of(&namespace, entity_type);
        prop_assert_eq!(
            propagated_permissions(&entity, &requested, &namespace_superuser()),
            requested
        );
    }

    #[test]
    fn grants_never_exceed_the_request(
        namespace in arb_namespace(),
        entity_type in arb_child_type(),
        granted in arb_permissions(),
        requested in arb_permissions(),
    ) {
        let perms = PrincipalPermissions::new().with_grant(
            &NamespaceScope::only([namespace.clone()]),
            granted
                .iter()
                .flat_map(|p| {
                    [
                        EntityTypeWithPermission::new(EntityType::Namespace, *p),
                        EntityTypeWithPermission::new(entity_type, *p),
                    ]
                }),
        );
        let entity = child_of(&namespace, entity_type);
        let direct = direct_permissions(&entity, &requested, &perms);
        let propagated = propagated_permissions(&entity, &requested, &perms);
        prop_assert!(direct.is_subset(&requested));
        prop_assert!(propagated.is_subset(&requested));
        prop_assert!(direct.is_subset(&granted));
    }
}
