//! Permissions held by one principal.

use std::collections::{BTreeSet, HashMap};

use warden_core::{EntityType, Permission};

use crate::role::{EntityTypeWithPermission, NamespaceScope};

/// A principal's grants, partitioned by namespace.
///
/// Grants from groups mapped to every namespace live in a shared partition
/// that applies to any namespace lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalPermissions {
    all_namespaces: BTreeSet<EntityTypeWithPermission>,
    by_namespace: HashMap<String, BTreeSet<EntityTypeWithPermission>>,
}

impl PrincipalPermissions {
    /// No grants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add grants under a namespace scope.
    pub fn grant<I>(&mut self, scope: &NamespaceScope, permissions: I)
    where
        I: IntoIterator<Item = EntityTypeWithPermission>,
    {
        match scope {
            NamespaceScope::All => self.all_namespaces.extend(permissions),
            NamespaceScope::Only(namespaces) => {
                let permissions: Vec<_> = permissions.into_iter().collect();
                for namespace in namespaces {
                    self.by_namespace
                        .entry(namespace.clone())
                        .or_default()
                        .extend(permissions.iter().copied());
                }
            }
        }
    }

    /// Builder form of [`grant`](Self::grant).
    pub fn with_grant<I>(mut self, scope: &NamespaceScope, permissions: I) -> Self
    where
        I: IntoIterator<Item = EntityTypeWithPermission>,
    {
        self.grant(scope, permissions);
        self
    }

    /// Every grant that applies in `namespace`.
    pub fn for_namespace<'a>(
        &'a self,
        namespace: &str,
    ) -> impl Iterator<Item = &'a EntityTypeWithPermission> + 'a {
        self.all_namespaces
            .iter()
            .chain(self.by_namespace.get(namespace).into_iter().flatten())
    }

    /// Permissions held on `entity_type` in `namespace`.
    ///
    /// `namespace_only` grants are skipped unless `include_namespace_only`.
    pub fn permissions_on(
        &self,
        namespace: &str,
        entity_type: EntityType,
        include_namespace_only: bool,
    ) -> BTreeSet<Permission> {
        self.for_namespace(namespace)
            .filter(|grant| grant.entity_type == entity_type)
            .filter(|grant| include_namespace_only || !grant.namespace_only)
            .map(|grant| grant.permission)
            .collect()
    }

    /// Whether there are no grants at all.
    pub fn is_empty(&self) -> bool {
        self.all_namespaces.is_empty() && self.by_namespace.values().all(BTreeSet::is_empty)
    }

    /// Total number of grants across partitions.
    pub fn len(&self) -> usize {
        self.all_namespaces.len() + self.by_namespace.values().map(BTreeSet::len).sum::<usize>()
    }
}
