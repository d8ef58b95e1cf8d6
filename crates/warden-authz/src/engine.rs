//! Permission decisions.
//!
//! A principal holds a permission on an entity when it is granted directly
//! on the entity's type in the entity's owning namespace, or when it is
//! granted on the owning namespace itself and propagates down.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};
use warden_core::{EntityId, EntityType, Permission, Principal, SYSTEM_NAMESPACE};
use warden_directory::GroupSource;

use crate::catalog::SharedCatalog;
use crate::error::AuthzResult;
use crate::principal::PrincipalPermissions;

/// Whether namespace grants may flow down to an entity type.
///
/// Secure keys and profiles hold or reach secret material and never inherit
/// namespace grants.
pub const fn propagates_to(entity_type: EntityType) -> bool {
    match entity_type {
        EntityType::SecureKey | EntityType::Profile => false,
        EntityType::Instance
        | EntityType::Namespace
        | EntityType::Application
        | EntityType::Program
        | EntityType::Dataset
        | EntityType::DatasetModule
        | EntityType::DatasetType
        | EntityType::Artifact
        | EntityType::SystemService
        | EntityType::KerberosPrincipal => true,
    }
}

/// Requested permissions that flow to `entity` from its namespace.
///
/// Empty when the entity belongs to the system namespace (which includes
/// every entity without a namespace) or its type never inherits. Otherwise
/// the requested permissions the principal holds on the `Namespace` type in
/// the owning namespace, ignoring `namespace_only` grants.
pub fn propagated_permissions(
    entity: &EntityId,
    permissions: &BTreeSet<Permission>,
    principal_permissions: &PrincipalPermissions,
) -> BTreeSet<Permission> {
    let namespace = entity.owning_namespace();
    if namespace == SYSTEM_NAMESPACE || !propagates_to(entity.entity_type()) {
        return BTreeSet::new();
    }

    let held = principal_permissions.permissions_on(namespace, EntityType::Namespace, false);
    permissions.intersection(&held).copied().collect()
}

/// Requested permissions held on the entity's own type in its owning
/// namespace.
///
/// `namespace_only` grants count only when the entity is the namespace.
pub fn direct_permissions(
    entity: &EntityId,
    permissions: &BTreeSet<Permission>,
    principal_permissions: &PrincipalPermissions,
) -> BTreeSet<Permission> {
    let held = principal_permissions.permissions_on(
        entity.owning_namespace(),
        entity.entity_type(),
        entity.is_namespace(),
    );
    permissions.intersection(&held).copied().collect()
}

/// Combines a group source with the role catalog to decide permissions.
#[derive(Clone)]
pub struct PermissionEngine {
    groups: Arc<dyn GroupSource>,
    catalog: SharedCatalog,
    propagation: bool,
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine")
            .field("catalog_generation", &self.catalog.generation())
            .field("propagation", &self.propagation)
            .finish_non_exhaustive()
    }
}

impl PermissionEngine {
    /// Create an engine with propagation enabled.
    pub fn new(groups: Arc<dyn GroupSource>, catalog: SharedCatalog) -> Self {
        Self {
            groups,
            catalog,
            propagation: true,
        }
    }

    /// Enable or disable namespace propagation.
    pub fn with_propagation(mut self, enabled: bool) -> Self {
        self.propagation = enabled;
        self
    }

    /// Whether namespace grants propagate.
    pub fn propagation_enabled(&self) -> bool {
        self.propagation
    }

    /// The shared catalog.
    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// The group source.
    pub fn group_source(&self) -> &Arc<dyn GroupSource> {
        &self.groups
    }

    /// [`propagated_permissions`], or nothing when propagation is disabled.
    pub fn propagated_permissions(
        &self,
        entity: &EntityId,
        permissions: &BTreeSet<Permission>,
        principal_permissions: &PrincipalPermissions,
    ) -> BTreeSet<Permission> {
        if !self.propagation {
            return BTreeSet::new();
        }
        propagated_permissions(entity, permissions, principal_permissions)
    }

    /// Requested permissions granted directly or by propagation.
    pub fn granted(
        &self,
        entity: &EntityId,
        permissions: &BTreeSet<Permission>,
        principal_permissions: &PrincipalPermissions,
    ) -> BTreeSet<Permission> {
        let mut granted = direct_permissions(entity, permissions, principal_permissions);
        if granted.len() < permissions.len() {
            granted.extend(self.propagated_permissions(entity, permissions, principal_permissions));
        }
        granted
    }

    /// Whether one permission is granted, given the principal's permissions.
    pub fn check(
        &self,
        principal_permissions: &PrincipalPermissions,
        entity: &EntityId,
        permission: Permission,
    ) -> bool {
        self.granted(entity, &BTreeSet::from([permission]), principal_permissions)
            .contains(&permission)
    }

    /// Resolve the principal's groups and build their permissions from the
    /// current catalog.
    ///
    /// Returns the catalog generation the permissions were built from.
    #[instrument(skip(self), fields(principal = %principal), level = "debug")]
    pub async fn resolve(&self, principal: &Principal) -> AuthzResult<(PrincipalPermissions, u64)> {
        let started = Instant::now();
        let groups = self.groups.groups_for(principal).await;
        warden_telemetry::metrics::record_resolution(started.elapsed(), groups.is_ok());
        let groups = groups?;

        let snapshot = self.catalog.snapshot();
        let permissions = snapshot.catalog.principal_permissions(&groups);
        debug!(
            groups = groups.len(),
            grants = permissions.len(),
            generation = snapshot.generation,
            "built principal permissions"
        );
        Ok((permissions, snapshot.generation))
    }

    /// Resolve and check in one step.
    pub async fn has_permission(
        &self,
        principal: &Principal,
        entity: &EntityId,
        permission: Permission,
    ) -> AuthzResult<bool> {
        let (permissions, _) = self.resolve(principal).await?;
        Ok(self.check(&permissions, entity, permission))
    }
}
