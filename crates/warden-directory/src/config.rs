//! Directory search configuration.

use std::fmt;
use std::time::Duration;

use crate::connection::SearchScope;
use crate::error::{DirectoryError, DirectoryResult};
use crate::retry::RetryPolicy;

/// Separator between base DNs in a configured base DN list.
pub const BASE_DN_SEPARATOR: char = ';';

/// Placeholder substituted with the escaped principal name.
pub const FILTER_PLACEHOLDER: &str = "%s";

/// Default attribute holding group memberships.
pub const DEFAULT_MEMBER_ATTRIBUTE: &str = "memberOf";

/// How a connection authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindMechanism {
    /// Anonymous.
    None,
    /// Simple bind with a DN and password.
    Simple,
}

impl BindMechanism {
    /// Name as written in the pool authentication list.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Simple => "simple",
        }
    }
}

/// Transport security of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Cleartext `ldap://`.
    Plain,
    /// TLS from the start, `ldaps://`.
    Ssl,
}

impl Transport {
    /// Name as written in the pool protocol list.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Ssl => "ssl",
        }
    }
}

/// Connection pool knobs.
///
/// A `max_size` of zero means no checkout limit. A `pref_size` of zero means
/// no preferred idle count, so idle retention is bounded by `max_size` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Bind mechanisms whose connections may be pooled.
    pub authentication: Vec<String>,
    /// Lifecycle logging level; `None` or `"none"` disables it.
    pub debug: Option<String>,
    /// Connections opened by warm-up.
    pub init_size: usize,
    /// Maximum concurrently checked-out connections.
    pub max_size: usize,
    /// Maximum idle connections kept after release.
    pub pref_size: usize,
    /// Transports whose connections may be pooled.
    pub protocol: Vec<String>,
    /// Idle time after which a pooled connection is dropped.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            authentication: parse_list("none simple"),
            debug: None,
            init_size: 1,
            max_size: 0,
            pref_size: 0,
            protocol: parse_list("plain"),
            idle_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poolable bind mechanisms from a space separated list.
    pub fn with_authentication(mut self, list: &str) -> Self {
        self.authentication = parse_list(list);
        self
    }

    /// Set the debug level.
    pub fn with_debug(mut self, level: impl Into<String>) -> Self {
        self.debug = Some(level.into());
        self
    }

    /// Set the warm-up size.
    pub fn with_init_size(mut self, size: usize) -> Self {
        self.init_size = size;
        self
    }

    /// Set the checkout limit.
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set the idle limit.
    pub fn with_pref_size(mut self, size: usize) -> Self {
        self.pref_size = size;
        self
    }

    /// Set the poolable transports from a space separated list.
    pub fn with_protocol(mut self, list: &str) -> Self {
        self.protocol = parse_list(list);
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Whether lifecycle events are logged.
    pub fn debug_enabled(&self) -> bool {
        self.debug
            .as_deref()
            .map(str::trim)
            .is_some_and(|level| !level.is_empty() && !level.eq_ignore_ascii_case("none"))
    }

    /// Whether connections with this bind mechanism and transport may be reused.
    pub fn is_poolable(&self, mechanism: BindMechanism, transport: Transport) -> bool {
        self.authentication.iter().any(|a| a == mechanism.as_str())
            && self.protocol.iter().any(|p| p == transport.as_str())
    }

    fn validate(&self) -> DirectoryResult<()> {
        if self.max_size > 0 {
            if self.init_size > self.max_size {
                return Err(DirectoryError::invalid_config(format!(
                    "pool init size {} exceeds max size {}",
                    self.init_size, self.max_size
                )));
            }
            if self.pref_size > self.max_size {
                return Err(DirectoryError::invalid_config(format!(
                    "pool pref size {} exceeds max size {}",
                    self.pref_size, self.max_size
                )));
            }
        }
        Ok(())
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_ascii_lowercase).collect()
}

/// Validated connection and search parameters.
///
/// Built with [`SearchConfig::builder`]; immutable afterwards.
///
/// # Example
///
/// ```
/// use warden_directory::SearchConfig;
///
/// let config = SearchConfig::builder()
///     .with_url("ldap://dir.example.com:389")
///     .with_base_dns("ou=people,dc=example,dc=com;ou=svc,dc=example,dc=com")
///     .with_filter("(uid=%s)")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.base_dns().len(), 2);
/// assert_eq!(config.filter_for("alice"), "(uid=alice)");
/// ```
#[derive(Clone)]
pub struct SearchConfig {
    url: String,
    base_dns: Vec<String>,
    filter: String,
    member_attribute: String,
    bind_dn: Option<String>,
    bind_password: Option<String>,
    recursive_search: bool,
    ignore_ssl_verify: bool,
    pool: PoolConfig,
    connect_timeout: Duration,
    attempt_timeout: Duration,
    connection_retry: RetryPolicy,
    search_retry: RetryPolicy,
}

impl SearchConfig {
    /// Start building a configuration.
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// Directory URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Base DNs, in search order.
    pub fn base_dns(&self) -> &[String] {
        &self.base_dns
    }

    /// Filter template containing one `%s`.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Search filter for a principal, with the name escaped.
    pub fn filter_for(&self, principal: &str) -> String {
        self.filter
            .replacen(FILTER_PLACEHOLDER, &ldap3::ldap_escape(principal), 1)
    }

    /// Attribute holding group memberships.
    pub fn member_attribute(&self) -> &str {
        &self.member_attribute
    }

    /// Lookup bind DN, if any.
    pub fn bind_dn(&self) -> Option<&str> {
        self.bind_dn.as_deref()
    }

    /// Lookup bind password, if any.
    pub fn bind_password(&self) -> Option<&str> {
        self.bind_password.as_deref()
    }

    /// Whether searches descend the whole subtree.
    pub fn recursive_search(&self) -> bool {
        self.recursive_search
    }

    /// Search scope implied by the recursive flag.
    pub fn scope(&self) -> SearchScope {
        if self.recursive_search {
            SearchScope::Subtree
        } else {
            SearchScope::OneLevel
        }
    }

    /// Whether certificate verification was requested off.
    pub fn ignore_ssl_verify(&self) -> bool {
        self.ignore_ssl_verify
    }

    /// Pool knobs.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Timeout for opening and binding a connection.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Timeout for one connect-and-search attempt.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Retry policy for connection acquisition.
    pub fn connection_retry(&self) -> &RetryPolicy {
        &self.connection_retry
    }

    /// Retry policy for the whole connect-and-search sequence.
    pub fn search_retry(&self) -> &RetryPolicy {
        &self.search_retry
    }

    /// Transport implied by the URL scheme.
    pub fn transport(&self) -> Transport {
        if has_scheme(&self.url, "ldaps://") {
            Transport::Ssl
        } else {
            Transport::Plain
        }
    }

    /// Bind mechanism implied by the credentials.
    pub fn bind_mechanism(&self) -> BindMechanism {
        if self.bind_dn.is_some() {
            BindMechanism::Simple
        } else {
            BindMechanism::None
        }
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("url", &self.url)
            .field("base_dns", &self.base_dns)
            .field("filter", &self.filter)
            .field("member_attribute", &self.member_attribute)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "<redacted>"))
            .field("recursive_search", &self.recursive_search)
            .field("ignore_ssl_verify", &self.ignore_ssl_verify)
            .field("pool", &self.pool)
            .field("connect_timeout", &self.connect_timeout)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("connection_retry", &self.connection_retry)
            .field("search_retry", &self.search_retry)
            .finish()
    }
}

fn has_scheme(url: &str, scheme: &str) -> bool {
    url.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// Builder for [`SearchConfig`].
#[derive(Debug, Clone)]
pub struct SearchConfigBuilder {
    url: String,
    base_dns: Vec<String>,
    filter: String,
    member_attribute: String,
    bind_dn: Option<String>,
    bind_password: Option<String>,
    recursive_search: bool,
    ignore_ssl_verify: bool,
    pool: PoolConfig,
    connect_timeout: Duration,
    attempt_timeout: Duration,
    connection_retry: RetryPolicy,
    search_retry: RetryPolicy,
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self {
            url: String::new(),
            base_dns: Vec::new(),
            filter: String::new(),
            member_attribute: DEFAULT_MEMBER_ATTRIBUTE.to_string(),
            bind_dn: None,
            bind_password: None,
            recursive_search: false,
            ignore_ssl_verify: false,
            pool: PoolConfig::default(),
            connect_timeout: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
            connection_retry: RetryPolicy::default(),
            search_retry: RetryPolicy::default(),
        }
    }
}

impl SearchConfigBuilder {
    /// Set the directory URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into().trim().to_string();
        self
    }

    /// Set the base DNs from a `;` separated list.
    pub fn with_base_dns(mut self, list: &str) -> Self {
        self.base_dns = list
            .split(BASE_DN_SEPARATOR)
            .map(str::trim)
            .filter(|dn| !dn.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Append a single base DN. A blank one is ignored.
    pub fn with_base_dn(mut self, dn: impl Into<String>) -> Self {
        let dn = dn.into();
        let dn = dn.trim();
        if !dn.is_empty() {
            self.base_dns.push(dn.to_string());
        }
        self
    }

    /// Set the filter template.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the membership attribute.
    pub fn with_member_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.member_attribute = attribute.into().trim().to_string();
        self
    }

    /// Set the lookup bind DN.
    pub fn with_bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Set the lookup bind password.
    pub fn with_bind_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Search the whole subtree instead of one level.
    pub fn with_recursive_search(mut self, recursive: bool) -> Self {
        self.recursive_search = recursive;
        self
    }

    /// Skip certificate verification for `ldaps` URLs.
    pub fn with_ignore_ssl_verify(mut self, ignore: bool) -> Self {
        self.ignore_ssl_verify = ignore;
        self
    }

    /// Set the pool knobs.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the connection acquisition retry policy.
    pub fn with_connection_retry(mut self, policy: RetryPolicy) -> Self {
        self.connection_retry = policy;
        self
    }

    /// Set the connect-and-search retry policy.
    pub fn with_search_retry(mut self, policy: RetryPolicy) -> Self {
        self.search_retry = policy;
        self
    }

    /// Validate and build.
    pub fn build(self) -> DirectoryResult<SearchConfig> {
        if self.url.is_empty() {
            return Err(DirectoryError::invalid_config("url is required"));
        }
        if !has_scheme(&self.url, "ldap://") && !has_scheme(&self.url, "ldaps://") {
            return Err(DirectoryError::invalid_config(format!(
                "url '{}' must use the ldap:// or ldaps:// scheme",
                self.url
            )));
        }
        if self.base_dns.is_empty() {
            return Err(DirectoryError::invalid_config("at least one base DN is required"));
        }
        let placeholders = self.filter.matches(FILTER_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(DirectoryError::invalid_config(format!(
                "search filter '{}' must contain exactly one {FILTER_PLACEHOLDER} placeholder, found {placeholders}",
                self.filter
            )));
        }
        if self.member_attribute.is_empty() {
            return Err(DirectoryError::invalid_config("member attribute must not be empty"));
        }
        if self.bind_password.is_some() && self.bind_dn.is_none() {
            return Err(DirectoryError::invalid_config(
                "bind password given without a bind DN",
            ));
        }
        if self.connect_timeout.is_zero() || self.attempt_timeout.is_zero() {
            return Err(DirectoryError::invalid_config("timeouts must be positive"));
        }
        self.pool.validate()?;

        Ok(SearchConfig {
            url: self.url,
            base_dns: self.base_dns,
            filter: self.filter,
            member_attribute: self.member_attribute,
            bind_dn: self.bind_dn,
            bind_password: self.bind_password,
            recursive_search: self.recursive_search,
            ignore_ssl_verify: self.ignore_ssl_verify,
            pool: self.pool,
            connect_timeout: self.connect_timeout,
            attempt_timeout: self.attempt_timeout,
            connection_retry: self.connection_retry,
            search_retry: self.search_retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SearchConfigBuilder {
        SearchConfig::builder()
            .with_url("ldap://localhost:389")
            .with_base_dns("ou=people,dc=example,dc=com")
            .with_filter("(uid=%s)")
    }

    #[test]
    fn test_base_dn_list_is_split_and_trimmed() {
        let config = builder()
            .with_base_dns(" ou=a,dc=x ; ;ou=b,dc=x;")
            .build()
            .unwrap();
        assert_eq!(config.base_dns(), ["ou=a,dc=x", "ou=b,dc=x"]);
    }

    #[test]
    fn test_single_base_dn_is_trimmed() {
        let config = builder()
            .with_base_dn("  ou=services,dc=example,dc=com ")
            .with_base_dn("   ")
            .build()
            .unwrap();
        assert_eq!(
            config.base_dns(),
            ["ou=people,dc=example,dc=com", "ou=services,dc=example,dc=com"]
        );

        assert!(builder().with_base_dns("").with_base_dn(" ").build().is_err());
    }

    #[test]
    fn test_required_fields() {
        assert!(builder().with_url("").build().is_err());
        assert!(builder().with_base_dns(" ; ").build().is_err());
        assert!(builder().with_url("http://localhost").build().is_err());
        assert!(builder().with_member_attribute(" ").build().is_err());
    }

    #[test]
    fn test_filter_placeholder_count() {
        assert!(builder().with_filter("(uid=alice)").build().is_err());
        assert!(builder().with_filter("(|(uid=%s)(cn=%s))").build().is_err());
    }

    #[test]
    fn test_filter_escapes_principal() {
        let config = builder().build().unwrap();
        assert_eq!(config.filter_for("bob"), "(uid=bob)");
        assert_eq!(config.filter_for("a*)(uid=*"), "(uid=a\\2a\\29\\28uid=\\2a)");
    }

    #[test]
    fn test_scope_follows_recursive_flag() {
        assert_eq!(builder().build().unwrap().scope(), SearchScope::OneLevel);
        assert_eq!(
            builder().with_recursive_search(true).build().unwrap().scope(),
            SearchScope::Subtree
        );
    }

    #[test]
    fn test_transport_and_mechanism() {
        let config = builder().build().unwrap();
        assert_eq!(config.transport(), Transport::Plain);
        assert_eq!(config.bind_mechanism(), BindMechanism::None);

        let config = builder()
            .with_url("LDAPS://dir:636")
            .with_bind_dn("cn=lookup")
            .with_bind_password("secret")
            .build()
            .unwrap();
        assert_eq!(config.transport(), Transport::Ssl);
        assert_eq!(config.bind_mechanism(), BindMechanism::Simple);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = builder()
            .with_bind_dn("cn=lookup")
            .with_bind_password("hunter2")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_pool_sizes_are_checked() {
        let pool = PoolConfig::new().with_max_size(2).with_init_size(3);
        assert!(builder().with_pool(pool).build().is_err());

        let pool = PoolConfig::new().with_max_size(2).with_pref_size(3);
        assert!(builder().with_pool(pool).build().is_err());

        let unbounded = PoolConfig::new().with_init_size(5).with_pref_size(5);
        assert!(builder().with_pool(unbounded).build().is_ok());
    }

    #[test]
    fn test_pool_eligibility() {
        let pool = PoolConfig::default();
        assert!(pool.is_poolable(BindMechanism::Simple, Transport::Plain));
        assert!(!pool.is_poolable(BindMechanism::Simple, Transport::Ssl));

        let pool = pool.with_protocol("plain SSL").with_authentication("simple");
        assert!(pool.is_poolable(BindMechanism::Simple, Transport::Ssl));
        assert!(!pool.is_poolable(BindMechanism::None, Transport::Plain));
    }

    #[test]
    fn test_pool_debug_flag() {
        assert!(!PoolConfig::default().debug_enabled());
        assert!(!PoolConfig::default().with_debug("none").debug_enabled());
        assert!(PoolConfig::default().with_debug("fine").debug_enabled());
    }
}
