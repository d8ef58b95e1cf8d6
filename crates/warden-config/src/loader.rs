//! Configuration loader with layered approach.
//!
//! Properties are layered, later layers overriding earlier ones:
//! 1. Property files and strings, in the order they were added
//! 2. Environment variables `PREFIX__KEY`, where `KEY` is the property key
//!    upper-cased with `.` replaced by `_` (`WARDEN__POOL_MAXSIZE`)
//!
//! The merged properties are then turned into a typed [`WardenConfig`].
//! Bind credentials missing from the properties are looked up in a
//! [`SecretStore`].

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use warden_authz::{AuthorizerSettings, CacheConfig, FullAccessList};
use warden_directory::{PoolConfig, SearchConfig};
use warden_telemetry::{LogConfig, LogFormat, MetricsConfig, TelemetryConfig};

use crate::properties::Properties;
use crate::secrets::{EnvSecretStore, SecretStore, LDAP_BIND_DN, LDAP_BIND_PASS};
use crate::ConfigError;

/// Default environment prefix.
pub const ENV_PREFIX: &str = "WARDEN";

/// Property keys.
pub mod keys {
    /// Directory URL.
    pub const URL: &str = "url";
    /// Search filter template with one `%s`.
    pub const SEARCH_FILTER: &str = "searchFilter";
    /// `;` separated base DNs.
    pub const SEARCH_BASE_DN: &str = "searchBaseDn";
    /// Attribute listing group memberships.
    pub const MEMBER_ATTRIBUTE: &str = "memberAttribute";
    /// Bind DN.
    pub const LOOK_UP_BIND_DN: &str = "lookUpBindDn";
    /// Bind password.
    pub const LOOK_UP_BIND_PASSWORD: &str = "lookUpBindPassword";
    /// Subtree instead of one-level search.
    pub const RECURSIVE_SEARCH: &str = "recursiveSearch";
    /// Skip certificate verification for `ldaps`.
    pub const IGNORE_SSL_VERIFY: &str = "ignoreSSLVerify";
    /// Connect timeout in milliseconds.
    pub const CONNECT_TIMEOUT: &str = "connectTimeout";
    /// Poolable bind mechanisms.
    pub const POOL_AUTHENTICATION: &str = "pool.authentication";
    /// Pool lifecycle logging.
    pub const POOL_DEBUG: &str = "pool.debug";
    /// Connections opened at startup.
    pub const POOL_INITSIZE: &str = "pool.initsize";
    /// Maximum checked-out connections.
    pub const POOL_MAXSIZE: &str = "pool.maxsize";
    /// Preferred idle connections.
    pub const POOL_PREFSIZE: &str = "pool.prefsize";
    /// Poolable transports.
    pub const POOL_PROTOCOL: &str = "pool.protocol";
    /// Idle timeout in milliseconds.
    pub const POOL_TIMEOUT: &str = "pool.timeout";
    /// Role mapping YAML path.
    pub const ROLE_YAML_PATH: &str = "roleYamlPath";
    /// Reload the role mapping when it changes.
    pub const WATCH_ROLE_YAML: &str = "watchRoleYaml";
    /// Honor the full-access list.
    pub const IGNORE_FULL_ACCESS_USERS: &str = "ignoreFullAccessUsers";
    /// Comma separated full-access principals.
    pub const FULL_ACCESS_USERS: &str = "fullAccessUsers";
    /// Log decisions without enforcing them.
    pub const LOGGING_ONLY: &str = "loggingOnly";
    /// Only honor direct grants.
    pub const DISABLE_PERMISSIONS_PROPAGATION: &str = "disablePermissionsPropagation";
    /// Permission cache time-to-live in seconds.
    pub const CACHE_TTL_SECONDS: &str = "cache.ttlSeconds";
    /// Permission cache capacity.
    pub const CACHE_MAX_ENTRIES: &str = "cache.maxEntries";
    /// Log filter directive.
    pub const LOGGING_LEVEL: &str = "logging.level";
    /// `json` or `pretty`.
    pub const LOGGING_FORMAT: &str = "logging.format";
    /// Install the metrics recorder.
    pub const METRICS_ENABLED: &str = "metrics.enabled";
    /// Prometheus listen address.
    pub const METRICS_ADDR: &str = "metrics.addr";

    /// Every recognized key.
    pub const ALL: &[&str] = &[
        URL,
        SEARCH_FILTER,
        SEARCH_BASE_DN,
        MEMBER_ATTRIBUTE,
        LOOK_UP_BIND_DN,
        LOOK_UP_BIND_PASSWORD,
        RECURSIVE_SEARCH,
        IGNORE_SSL_VERIFY,
        CONNECT_TIMEOUT,
        POOL_AUTHENTICATION,
        POOL_DEBUG,
        POOL_INITSIZE,
        POOL_MAXSIZE,
        POOL_PREFSIZE,
        POOL_PROTOCOL,
        POOL_TIMEOUT,
        ROLE_YAML_PATH,
        WATCH_ROLE_YAML,
        IGNORE_FULL_ACCESS_USERS,
        FULL_ACCESS_USERS,
        LOGGING_ONLY,
        DISABLE_PERMISSIONS_PROPAGATION,
        CACHE_TTL_SECONDS,
        CACHE_MAX_ENTRIES,
        LOGGING_LEVEL,
        LOGGING_FORMAT,
        METRICS_ENABLED,
        METRICS_ADDR,
    ];
}

/// Environment variable name overriding a property key.
pub fn env_var_name(prefix: &str, key: &str) -> String {
    format!("{}__{}", prefix.to_uppercase(), key.to_uppercase().replace('.', "_"))
}

/// Java-style boolean: only `true`, in any case, is true.
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Everything needed to run Warden.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Directory search settings.
    pub search: SearchConfig,
    /// Authorizer switches and cache.
    pub authorizer: AuthorizerSettings,
    /// Principals granted everything when full access is honored.
    pub full_access_users: FullAccessList,
    /// Role mapping YAML, if any.
    pub role_yaml_path: Option<PathBuf>,
    /// Reload the role mapping on change.
    pub watch_role_yaml: bool,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
}

impl WardenConfig {
    /// Build from merged properties.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for missing required keys, unparsable numbers
    /// or settings the directory layer rejects.
    pub fn from_properties(
        properties: &Properties,
        secrets: &dyn SecretStore,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            search: search_config(properties, secrets)?,
            authorizer: authorizer_settings(properties)?,
            full_access_users: properties
                .get(keys::FULL_ACCESS_USERS)
                .map(FullAccessList::from_csv)
                .unwrap_or_default(),
            role_yaml_path: properties.get_trimmed(keys::ROLE_YAML_PATH).map(PathBuf::from),
            watch_role_yaml: flag(properties, keys::WATCH_ROLE_YAML),
            telemetry: telemetry_config(properties)?,
        })
    }
}

fn flag(properties: &Properties, key: &str) -> bool {
    properties.get(key).is_some_and(parse_bool)
}

fn number<T: std::str::FromStr>(properties: &Properties, key: &str) -> Result<Option<T>, ConfigError> {
    properties
        .get_trimmed(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| ConfigError::invalid_value(key, format!("expected a non-negative integer, got '{raw}'")))
        })
        .transpose()
}

fn required<'a>(properties: &'a Properties, key: &str) -> Result<&'a str, ConfigError> {
    properties
        .get_trimmed(key)
        .ok_or_else(|| ConfigError::missing_field(key))
}

fn credential(
    properties: &Properties,
    key: &str,
    secrets: &dyn SecretStore,
    secret: &str,
) -> Result<Option<String>, ConfigError> {
    match properties.get(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => Ok(Some(value.to_string())),
        None => Ok(secrets.get(secret)?.filter(|v| !v.trim().is_empty())),
    }
}

fn pool_config(properties: &Properties) -> Result<PoolConfig, ConfigError> {
    let mut pool = PoolConfig::default();
    if let Some(list) = properties.get_trimmed(keys::POOL_AUTHENTICATION) {
        pool = pool.with_authentication(list);
    }
    if let Some(level) = properties.get_trimmed(keys::POOL_DEBUG) {
        pool = pool.with_debug(level);
    }
    if let Some(size) = number(properties, keys::POOL_INITSIZE)? {
        pool = pool.with_init_size(size);
    }
    if let Some(size) = number(properties, keys::POOL_MAXSIZE)? {
        pool = pool.with_max_size(size);
    }
    if let Some(size) = number(properties, keys::POOL_PREFSIZE)? {
        pool = pool.with_pref_size(size);
    }
    if let Some(list) = properties.get_trimmed(keys::POOL_PROTOCOL) {
        pool = pool.with_protocol(list);
    }
    if let Some(millis) = number::<u64>(properties, keys::POOL_TIMEOUT)? {
        if millis > 0 {
            pool = pool.with_idle_timeout(Duration::from_millis(millis));
        }
    }
    Ok(pool)
}

fn search_config(
    properties: &Properties,
    secrets: &dyn SecretStore,
) -> Result<SearchConfig, ConfigError> {
    let mut builder = SearchConfig::builder()
        .with_url(required(properties, keys::URL)?)
        .with_base_dns(required(properties, keys::SEARCH_BASE_DN)?)
        .with_filter(required(properties, keys::SEARCH_FILTER)?)
        .with_recursive_search(flag(properties, keys::RECURSIVE_SEARCH))
        .with_ignore_ssl_verify(flag(properties, keys::IGNORE_SSL_VERIFY))
        .with_pool(pool_config(properties)?);

    if let Some(attribute) = properties.get_trimmed(keys::MEMBER_ATTRIBUTE) {
        builder = builder.with_member_attribute(attribute);
    }
    if let Some(dn) = credential(properties, keys::LOOK_UP_BIND_DN, secrets, LDAP_BIND_DN)? {
        builder = builder.with_bind_dn(dn);
    }
    if let Some(password) =
        credential(properties, keys::LOOK_UP_BIND_PASSWORD, secrets, LDAP_BIND_PASS)?
    {
        builder = builder.with_bind_password(password);
    }
    if let Some(millis) = number::<u64>(properties, keys::CONNECT_TIMEOUT)? {
        builder = builder.with_connect_timeout(Duration::from_millis(millis));
    }

    Ok(builder.build()?)
}

fn authorizer_settings(properties: &Properties) -> Result<AuthorizerSettings, ConfigError> {
    let defaults = CacheConfig::default();
    let cache = CacheConfig {
        max_entries: number(properties, keys::CACHE_MAX_ENTRIES)?.unwrap_or(defaults.max_entries),
        ttl: number(properties, keys::CACHE_TTL_SECONDS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl),
    };

    Ok(AuthorizerSettings::new()
        .with_ignore_full_access_users(flag(properties, keys::IGNORE_FULL_ACCESS_USERS))
        .with_logging_only(flag(properties, keys::LOGGING_ONLY))
        .with_disable_permissions_propagation(flag(properties, keys::DISABLE_PERMISSIONS_PROPAGATION))
        .with_cache_config(cache))
}

fn telemetry_config(properties: &Properties) -> Result<TelemetryConfig, ConfigError> {
    let mut logging = LogConfig::default();
    if let Some(level) = properties.get_trimmed(keys::LOGGING_LEVEL) {
        logging = logging.with_level(level);
    }
    if let Some(format) = properties.get_trimmed(keys::LOGGING_FORMAT) {
        let format: LogFormat = format
            .parse()
            .map_err(|_| ConfigError::invalid_value(keys::LOGGING_FORMAT, "expected 'json' or 'pretty'"))?;
        logging = logging.with_format(format);
    }

    let metrics = MetricsConfig {
        enabled: flag(properties, keys::METRICS_ENABLED),
        addr: properties.get_trimmed(keys::METRICS_ADDR).map(str::to_string),
    };

    Ok(TelemetryConfig { logging, metrics })
}

/// Configuration loader with layered approach.
///
/// # Example
///
/// ```no_run
/// use warden_config::ConfigLoader;
///
/// # fn main() -> Result<(), warden_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("/etc/warden/ldap.properties")?
///     .with_env_prefix("WARDEN")
///     .load()?;
/// println!("searching {}", config.search.url());
/// # Ok(())
/// # }
/// ```
pub struct ConfigLoader {
    properties: Properties,
    env_prefix: Option<String>,
    env_vars: Option<HashMap<String, String>>,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("keys", &self.properties.len())
            .field("env_prefix", &self.env_prefix)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader with no properties.
    ///
    /// Secrets default to unprefixed environment variables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: Properties::new(),
            env_prefix: None,
            env_vars: None,
            secrets: Arc::new(EnvSecretStore::new()),
        }
    }

    /// Layer a property file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable or malformed.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        self.properties.merge(Properties::from_file(path)?);
        Ok(self)
    }

    /// Layer a property file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Layer property file content.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the content is malformed.
    pub fn with_string(mut self, content: &str) -> Result<Self, ConfigError> {
        self.properties.merge(Properties::parse(content)?);
        Ok(self)
    }

    /// Layer already parsed properties.
    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties.merge(properties);
        self
    }

    /// Enable environment overrides under a prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Read overrides from these variables instead of the process
    /// environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Load a `.env` file into the process environment, if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::invalid_config(format!("failed to load .env: {e}"))),
        }
    }

    /// Look up missing bind credentials in this store.
    #[must_use]
    pub fn with_secret_store(mut self, store: impl SecretStore + 'static) -> Self {
        self.secrets = Arc::new(store);
        self
    }

    /// The merged properties, with environment overrides applied.
    pub fn load_properties(&self) -> Properties {
        let mut properties = self.properties.clone();
        if let Some(prefix) = &self.env_prefix {
            let vars = self
                .env_vars
                .clone()
                .unwrap_or_else(|| env::vars().collect());
            apply_env_overrides(&mut properties, prefix, &vars);
        }
        properties
    }

    /// Finalize and return the typed configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required keys are missing or any value is
    /// invalid.
    pub fn load(self) -> Result<WardenConfig, ConfigError> {
        let properties = self.load_properties();
        WardenConfig::from_properties(&properties, self.secrets.as_ref())
    }
}

fn apply_env_overrides(properties: &mut Properties, prefix: &str, vars: &HashMap<String, String>) {
    for key in keys::ALL {
        if let Some(value) = vars.get(&env_var_name(prefix, key)) {
            properties.set(*key, value.clone());
        }
    }
}
