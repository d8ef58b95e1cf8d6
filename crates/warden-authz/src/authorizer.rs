//! The authorization facade.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use warden_core::{EntityId, Permission, Principal};
use warden_directory::GroupSource;
use warden_telemetry::metrics::{record_catalog_reload, record_decision, record_directory_failure};

use crate::cache::{CacheStats, PermissionCache};
use crate::catalog::{RoleGroupCatalog, SharedCatalog};
use crate::config::AuthorizerSettings;
use crate::engine::PermissionEngine;
use crate::error::AuthzResult;
use crate::principal::PrincipalPermissions;

/// Outcome of a single permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// The permission is granted.
    Allow,
    /// The permission is not granted.
    Deny,
}

impl Decision {
    /// Whether the decision allows the operation.
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Lower-case label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides which principals bypass authorization entirely.
pub trait FullAccessPolicy: Send + Sync + 'static {
    /// Whether the principal is granted everything.
    fn has_full_access(&self, principal: &Principal) -> bool;
}

/// Nobody has full access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFullAccess;

impl FullAccessPolicy for NoFullAccess {
    fn has_full_access(&self, _principal: &Principal) -> bool {
        false
    }
}

/// Full access for a fixed list of principal names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullAccessList {
    principals: HashSet<String>,
}

impl FullAccessList {
    /// Create a list from principal names. Blank names are ignored.
    pub fn new<I, S>(principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principals: principals
                .into_iter()
                .map(Into::into)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Parse a comma separated list.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Number of listed principals.
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl FullAccessPolicy for FullAccessList {
    fn has_full_access(&self, principal: &Principal) -> bool {
        self.principals.contains(principal.name())
    }
}

/// Decides permissions for principals on entities.
///
/// Group resolution failures never surface as errors from
/// [`authorize`](Self::authorize): they are logged and the request is
/// denied, unless logging-only mode is on.
pub struct Authorizer {
    engine: PermissionEngine,
    cache: PermissionCache,
    settings: AuthorizerSettings,
    full_access: Arc<dyn FullAccessPolicy>,
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("engine", &self.engine)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Create an authorizer. Nobody has full access until a policy is set
    /// with [`with_full_access_policy`](Self::with_full_access_policy).
    pub fn new(
        groups: Arc<dyn GroupSource>,
        catalog: SharedCatalog,
        settings: AuthorizerSettings,
    ) -> Self {
        let engine = PermissionEngine::new(groups, catalog)
            .with_propagation(!settings.disable_permissions_propagation);
        let cache = PermissionCache::new(settings.cache.clone());
        Self {
            engine,
            cache,
            settings,
            full_access: Arc::new(NoFullAccess),
        }
    }

    /// Set the full-access policy.
    pub fn with_full_access_policy(mut self, policy: impl FullAccessPolicy) -> Self {
        self.full_access = Arc::new(policy);
        self
    }

    /// The settings in effect.
    pub fn settings(&self) -> &AuthorizerSettings {
        &self.settings
    }

    /// The underlying engine.
    pub fn engine(&self) -> &PermissionEngine {
        &self.engine
    }

    /// The shared role catalog.
    pub fn catalog(&self) -> &SharedCatalog {
        self.engine.catalog()
    }

    fn bypasses(&self, principal: &Principal) -> bool {
        self.settings.ignore_full_access_users && self.full_access.has_full_access(principal)
    }

    /// Decide one permission.
    pub async fn authorize(
        &self,
        principal: &Principal,
        entity: &EntityId,
        permission: Permission,
    ) -> Decision {
        let granted = self
            .authorize_any(principal, entity, &BTreeSet::from([permission]))
            .await;
        Decision::from(granted.contains(&permission))
    }

    /// The subset of `permissions` the principal holds on `entity`.
    #[instrument(skip(self, permissions), fields(principal = %principal, entity = %entity))]
    pub async fn authorize_any(
        &self,
        principal: &Principal,
        entity: &EntityId,
        permissions: &BTreeSet<Permission>,
    ) -> BTreeSet<Permission> {
        if self.bypasses(principal) {
            debug!("full access principal");
            record_decision(Decision::Allow.as_str(), "full_access");
            return permissions.clone();
        }

        let granted = match self.principal_permissions(principal).await {
            Ok(principal_permissions) => {
                self.engine.granted(entity, permissions, &principal_permissions)
            }
            Err(err) => {
                warn!(
                    attempts = ?err.attempts(),
                    error = %err,
                    "could not resolve principal permissions, denying"
                );
                record_directory_failure(err.kind());
                BTreeSet::new()
            }
        };

        let decision = Decision::from(granted.len() == permissions.len());

        if self.settings.logging_only {
            if !decision.is_allowed() {
                let denied: Vec<String> = permissions
                    .difference(&granted)
                    .map(ToString::to_string)
                    .collect();
                info!(denied = ?denied, "would deny, allowed in logging-only mode");
            }
            record_decision(Decision::Allow.as_str(), "logging_only");
            return permissions.clone();
        }

        debug!(%decision, granted = granted.len(), requested = permissions.len(), "authorization decision");
        record_decision(decision.as_str(), "enforced");
        granted
    }

    /// The principal's permissions, from cache or freshly resolved.
    ///
    /// # Errors
    ///
    /// Returns the directory error when groups cannot be resolved.
    pub async fn principal_permissions(
        &self,
        principal: &Principal,
    ) -> AuthzResult<Arc<PrincipalPermissions>> {
        let generation = self.engine.catalog().generation();
        if let Some(cached) = self.cache.get(principal.name(), generation) {
            debug!(cached = true, "principal permissions");
            return Ok(cached);
        }

        let (permissions, generation) = self.engine.resolve(principal).await?;
        let permissions = Arc::new(permissions);
        self.cache
            .insert(principal.name(), generation, Arc::clone(&permissions));
        Ok(permissions)
    }

    /// Install a new role catalog and drop cached permissions.
    ///
    /// Returns the new catalog generation.
    pub fn reload_catalog(&self, catalog: RoleGroupCatalog) -> u64 {
        let generation = self.engine.catalog().replace(catalog);
        self.cache.clear();
        record_catalog_reload(true);
        generation
    }

    /// Drop one principal's cached permissions, or all when `None`.
    pub fn invalidate_cache(&self, principal: Option<&Principal>) {
        match principal {
            Some(principal) => {
                self.cache.invalidate(principal.name());
            }
            None => self.cache.clear(),
        }
    }

    /// Permission cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Check directory connectivity once.
    ///
    /// # Errors
    ///
    /// Returns the directory error from the single attempt.
    pub async fn test_connection(&self) -> AuthzResult<()> {
        self.engine.group_source().probe().await?;
        Ok(())
    }
}
