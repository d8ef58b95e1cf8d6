//! Secret lookup for directory bind credentials.
//!
//! When the property file carries no bind DN or password they are looked up
//! by name in a [`SecretStore`].

use std::collections::HashMap;
use std::env;
use std::fmt;

use crate::ConfigError;

/// Secret name of the bind DN.
pub const LDAP_BIND_DN: &str = "ldap_bind_dn";

/// Secret name of the bind password.
pub const LDAP_BIND_PASS: &str = "ldap_bind_pass";

/// A source of named secrets.
pub trait SecretStore: Send + Sync {
    /// Look up a secret. `Ok(None)` when it does not exist.
    fn get(&self, name: &str) -> Result<Option<String>, ConfigError>;
}

/// Secrets held in memory.
#[derive(Clone, Default)]
pub struct MapSecretStore {
    secrets: HashMap<String, String>,
}

impl MapSecretStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl fmt::Debug for MapSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.secrets.keys().collect();
        names.sort();
        f.debug_struct("MapSecretStore").field("names", &names).finish()
    }
}

impl SecretStore for MapSecretStore {
    fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.secrets.get(name).cloned())
    }
}

/// Secrets read from environment variables.
///
/// `ldap_bind_dn` is read from `LDAP_BIND_DN`, or `WARDEN_LDAP_BIND_DN` with
/// prefix `WARDEN`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    prefix: Option<String>,
}

impl EnvSecretStore {
    /// Read unprefixed variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read variables under a prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into().to_uppercase()),
        }
    }

    /// Variable name a secret is read from.
    pub fn variable_for(&self, name: &str) -> String {
        let name = name.to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name,
        }
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let var = self.variable_for(name);
        match env::var(&var) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => {
                Err(ConfigError::secret(name, format!("{var} is not valid unicode")))
            }
        }
    }
}

/// Nothing is secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl SecretStore for NoSecrets {
    fn get(&self, _name: &str) -> Result<Option<String>, ConfigError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_store() {
        let store = MapSecretStore::new().with_secret(LDAP_BIND_PASS, "hunter2");
        assert_eq!(store.get(LDAP_BIND_PASS).unwrap().as_deref(), Some("hunter2"));
        assert_eq!(store.get(LDAP_BIND_DN).unwrap(), None);
    }

    #[test]
    fn test_map_store_debug_hides_values() {
        let store = MapSecretStore::new().with_secret(LDAP_BIND_PASS, "hunter2");
        let debug = format!("{store:?}");
        assert!(debug.contains(LDAP_BIND_PASS));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_env_variable_names() {
        assert_eq!(EnvSecretStore::new().variable_for(LDAP_BIND_DN), "LDAP_BIND_DN");
        assert_eq!(
            EnvSecretStore::with_prefix("warden").variable_for(LDAP_BIND_PASS),
            "WARDEN_LDAP_BIND_PASS"
        );
    }

    #[test]
    fn test_env_store_missing_variable() {
        let store = EnvSecretStore::with_prefix("WARDEN_TEST_UNSET_7F3A");
        assert_eq!(store.get(LDAP_BIND_DN).unwrap(), None);
    }

    #[test]
    fn test_no_secrets() {
        assert_eq!(NoSecrets.get(LDAP_BIND_DN).unwrap(), None);
    }
}
