//! Configuration for the authorization facade.

use crate::cache::CacheConfig;

/// Switches that shape how [`Authorizer`](crate::Authorizer) decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizerSettings {
    /// Grant everything to principals matched by the full-access policy,
    /// without resolving their groups.
    pub ignore_full_access_users: bool,
    /// Compute and log decisions but always allow.
    pub logging_only: bool,
    /// Only honor grants made directly on the entity's type.
    pub disable_permissions_propagation: bool,
    /// Principal permission cache.
    pub cache: CacheConfig,
}

impl Default for AuthorizerSettings {
    fn default() -> Self {
        Self {
            ignore_full_access_users: false,
            logging_only: false,
            disable_permissions_propagation: false,
            cache: CacheConfig::default(),
        }
    }
}

impl AuthorizerSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the full-access short circuit.
    pub fn with_ignore_full_access_users(mut self, enabled: bool) -> Self {
        self.ignore_full_access_users = enabled;
        self
    }

    /// Enable or disable logging-only mode.
    pub fn with_logging_only(mut self, enabled: bool) -> Self {
        self.logging_only = enabled;
        self
    }

    /// Disable namespace propagation.
    pub fn with_disable_permissions_propagation(mut self, disabled: bool) -> Self {
        self.disable_permissions_propagation = disabled;
        self
    }

    /// Set the cache configuration.
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Create a production configuration.
    pub fn production() -> Self {
        Self {
            cache: CacheConfig::production(),
            ..Self::default()
        }
    }

    /// Create a development configuration.
    ///
    /// Decisions are logged but never enforced.
    pub fn development() -> Self {
        Self {
            logging_only: true,
            cache: CacheConfig::development(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enforces() {
        let settings = AuthorizerSettings::default();
        assert!(!settings.logging_only);
        assert!(!settings.ignore_full_access_users);
        assert!(!settings.disable_permissions_propagation);
    }

    #[test]
    fn test_builder_pattern() {
        let settings = AuthorizerSettings::new()
            .with_logging_only(true)
            .with_disable_permissions_propagation(true)
            .with_cache_config(CacheConfig::disabled());
        assert!(settings.logging_only);
        assert!(settings.disable_permissions_propagation);
        assert!(!settings.cache.is_enabled());
    }

    #[test]
    fn test_presets() {
        assert!(!AuthorizerSettings::production().logging_only);
        assert!(AuthorizerSettings::development().logging_only);
    }
}
