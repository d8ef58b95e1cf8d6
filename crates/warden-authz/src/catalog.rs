//! Role and group catalog.
//!
//! A [`RoleGroupCatalog`] is immutable once built. [`SharedCatalog`] holds
//! the current one behind an `Arc` and replaces it wholesale, so a check
//! that took a snapshot keeps seeing one complete catalog even if a reload
//! happens meanwhile.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{AuthzError, AuthzResult};
use crate::principal::PrincipalPermissions;
use crate::role::{EntityTypeWithPermission, GroupWithRoles, NamespaceScope, Role};

/// Roles keyed by name and group mappings keyed by group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGroupCatalog {
    roles: HashMap<String, Role>,
    groups: HashMap<String, GroupWithRoles>,
}

impl RoleGroupCatalog {
    /// Build a catalog.
    ///
    /// Fails on duplicate role names, duplicate group keys, a group with an
    /// empty namespace list, or a group referencing a role that is not
    /// defined.
    pub fn new(
        roles: impl IntoIterator<Item = Role>,
        groups: impl IntoIterator<Item = GroupWithRoles>,
    ) -> AuthzResult<Self> {
        let mut role_map = HashMap::new();
        for role in roles {
            if role.name.trim().is_empty() {
                return Err(AuthzError::configuration("role with empty name"));
            }
            if role_map.contains_key(&role.name) {
                return Err(AuthzError::configuration(format!(
                    "duplicate role '{}'",
                    role.name
                )));
            }
            role_map.insert(role.name.clone(), role);
        }

        let mut group_map = HashMap::new();
        for group in groups {
            if group_map.contains_key(&group.group) {
                return Err(AuthzError::configuration(format!(
                    "duplicate group mapping '{}'",
                    group.group
                )));
            }
            if matches!(&group.namespaces, NamespaceScope::Only(ns) if ns.is_empty()) {
                return Err(AuthzError::configuration(format!(
                    "group '{}' has an empty namespace list",
                    group.group
                )));
            }
            if let Some(missing) = group.roles.iter().find(|r| !role_map.contains_key(*r)) {
                return Err(AuthzError::configuration(format!(
                    "group '{}' references unknown role '{missing}'",
                    group.group
                )));
            }
            group_map.insert(group.group.clone(), group);
        }

        Ok(Self {
            roles: role_map,
            groups: group_map,
        })
    }

    /// A catalog that grants nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a role.
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Look up a group mapping.
    pub fn group(&self, group: &str) -> Option<&GroupWithRoles> {
        self.groups.get(group)
    }

    /// Number of roles.
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of group mappings.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn roles_of<'a>(&'a self, mapping: &'a GroupWithRoles) -> impl Iterator<Item = &'a Role> + 'a {
        mapping.roles.iter().filter_map(|name| self.roles.get(name))
    }

    /// Union of the permissions conferred by `groups`.
    ///
    /// Groups without a mapping contribute nothing.
    pub fn permissions_for_groups<'g, I>(&self, groups: I) -> BTreeSet<EntityTypeWithPermission>
    where
        I: IntoIterator<Item = &'g String>,
    {
        groups
            .into_iter()
            .filter_map(|group| self.groups.get(group))
            .flat_map(|mapping| self.roles_of(mapping))
            .flat_map(|role| role.permissions.iter().copied())
            .collect()
    }

    /// The permissions conferred by `groups`, partitioned by each group's
    /// namespace scope.
    pub fn principal_permissions<'g, I>(&self, groups: I) -> PrincipalPermissions
    where
        I: IntoIterator<Item = &'g String>,
    {
        let mut permissions = PrincipalPermissions::new();
        for mapping in groups.into_iter().filter_map(|group| self.groups.get(group)) {
            let granted = self
                .roles_of(mapping)
                .flat_map(|role| role.permissions.iter().copied());
            permissions.grant(&mapping.namespaces, granted);
        }
        permissions
    }
}

/// A catalog with the generation it was installed at.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Increases by one on every replacement.
    pub generation: u64,
    /// The catalog.
    pub catalog: Arc<RoleGroupCatalog>,
}

/// The current catalog, replaceable at runtime.
///
/// Cloning shares the same underlying slot.
#[derive(Debug, Clone)]
pub struct SharedCatalog {
    current: Arc<RwLock<CatalogSnapshot>>,
}

impl SharedCatalog {
    /// Install the first catalog at generation 0.
    pub fn new(catalog: RoleGroupCatalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(CatalogSnapshot {
                generation: 0,
                catalog: Arc::new(catalog),
            })),
        }
    }

    /// The current catalog and its generation.
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.current.read().clone()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Swap in a new catalog and return its generation.
    pub fn replace(&self, catalog: RoleGroupCatalog) -> u64 {
        let roles = catalog.role_count();
        let groups = catalog.group_count();
        let catalog = Arc::new(catalog);

        let generation = {
            let mut current = self.current.write();
            current.generation += 1;
            current.catalog = catalog;
            current.generation
        };

        info!(generation, roles, groups, "role catalog replaced");
        generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{EntityType, Permission};

    fn admin_role() -> Role {
        Role::new(
            "admin",
            [EntityTypeWithPermission::new(EntityType::Namespace, Permission::Get)],
        )
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_dangling_role_reference_fails() {
        let err = RoleGroupCatalog::new([admin_role()], [GroupWithRoles::new("admins", ["root"])])
            .unwrap_err();
        assert!(matches!(err, AuthzError::Configuration(_)));
        assert!(err.to_string().contains("unknown role 'root'"));
    }

    #[test]
    fn test_empty_namespace_list_fails() {
        let err = RoleGroupCatalog::new(
            [admin_role()],
            [GroupWithRoles::new("admins", ["admin"]).with_namespaces(NamespaceScope::only([" "]))],
        )
        .unwrap_err();
        assert!(matches!(err, AuthzError::Configuration(_)));
        assert!(err.to_string().contains("empty namespace list"));
    }

    #[test]
    fn test_duplicate_keys_fail() {
        assert!(RoleGroupCatalog::new([admin_role(), admin_role()], []).is_err());
        assert!(RoleGroupCatalog::new(
            [admin_role()],
            [
                GroupWithRoles::new("admins", ["admin"]),
                GroupWithRoles::new("admins", ["admin"]),
            ],
        )
        .is_err());
    }

    #[test]
    fn test_unknown_groups_contribute_nothing() {
        let catalog =
            RoleGroupCatalog::new([admin_role()], [GroupWithRoles::new("admins", ["admin"])]).unwrap();
        assert!(catalog.permissions_for_groups(&groups(&["strangers"])).is_empty());
        assert_eq!(
            catalog
                .permissions_for_groups(&groups(&["admins", "strangers"]))
                .len(),
            1
        );
    }

    #[test]
    fn test_permissions_are_unioned() {
        let dev = Role::new(
            "dev",
            [
                EntityTypeWithPermission::new(EntityType::Artifact, Permission::Create),
                EntityTypeWithPermission::new(EntityType::Namespace, Permission::Get),
            ],
        );
        let catalog = RoleGroupCatalog::new(
            [admin_role(), dev],
            [
                GroupWithRoles::new("admins", ["admin"]),
                GroupWithRoles::new("devs", ["dev"]),
            ],
        )
        .unwrap();
        let perms = catalog.permissions_for_groups(&groups(&["admins", "devs"]));
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn test_principal_permissions_respect_scope() {
        let catalog = RoleGroupCatalog::new(
            [admin_role()],
            [GroupWithRoles::new("test-admins", ["admin"])
                .with_namespaces(NamespaceScope::only(["test"]))],
        )
        .unwrap();
        let perms = catalog.principal_permissions(&groups(&["test-admins"]));
        assert_eq!(perms.permissions_on("test", EntityType::Namespace, false).len(), 1);
        assert!(perms.permissions_on("prod", EntityType::Namespace, false).is_empty());
    }

    #[test]
    fn test_shared_catalog_replace() {
        let shared = SharedCatalog::new(RoleGroupCatalog::empty());
        let before = shared.snapshot();
        assert_eq!(before.generation, 0);

        let next =
            RoleGroupCatalog::new([admin_role()], [GroupWithRoles::new("admins", ["admin"])]).unwrap();
        assert_eq!(shared.replace(next), 1);

        // The old snapshot is untouched.
        assert_eq!(before.catalog.role_count(), 0);
        let after = shared.snapshot();
        assert_eq!(after.generation, 1);
        assert_eq!(after.catalog.role_count(), 1);
        assert_eq!(shared.clone().generation(), 1);
    }
}
