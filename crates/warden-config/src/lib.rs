//! Configuration for Warden.
//!
//! This crate turns deployment files into the typed values the other Warden
//! crates consume:
//! - Flat `key=value` property files ([`Properties`])
//! - Environment variable overrides (`WARDEN__POOL_MAXSIZE=8`)
//! - Bind credentials from a [`SecretStore`] when the properties omit them
//! - The role mapping YAML ([`RoleMappingFile`])
//! - A [`FileWatcher`] for reloading the role mapping
//!
//! # Example
//!
//! ```no_run
//! use warden_config::{load_role_catalog, ConfigLoader, ENV_PREFIX};
//!
//! # fn main() -> Result<(), warden_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("/etc/warden/ldap.properties")?
//!     .with_env_prefix(ENV_PREFIX)
//!     .load()?;
//!
//! if let Some(path) = &config.role_yaml_path {
//!     let catalog = load_role_catalog(path)?;
//!     println!("{} roles", catalog.role_count());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Property File Format
//!
//! ```properties
//! url=ldaps://dir.example.com:636
//! searchBaseDn=ou=people,dc=example,dc=com;ou=services,dc=example,dc=com
//! searchFilter=(uid=%s)
//! memberAttribute=memberOf
//! recursiveSearch=true
//! pool.maxsize=16
//! pool.protocol=plain ssl
//! roleYamlPath=/etc/warden/roles.yaml
//! watchRoleYaml=true
//! loggingOnly=false
//! ```
//!
//! Booleans follow Java rules: only `true`, in any case, is true.

#![doc(html_root_url = "https://docs.rs/warden-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod loader;
mod properties;
mod role_mapping;
mod secrets;
mod watcher;

pub use error::ConfigError;
pub use loader::{env_var_name, keys, parse_bool, ConfigLoader, WardenConfig, ENV_PREFIX};
pub use properties::Properties;
pub use role_mapping::{load_role_catalog, RoleMappingFile};
pub use secrets::{EnvSecretStore, MapSecretStore, NoSecrets, SecretStore, LDAP_BIND_DN, LDAP_BIND_PASS};
pub use watcher::{FileChangeEvent, FileChangeKind, FileWatcher, FileWatcherBuilder, DEFAULT_DEBOUNCE};
