//! Directory connections.
//!
//! [`Connector`] opens connections and [`DirectoryConnection`] runs searches
//! on them. [`LdapConnector`] is the production implementation on top of
//! `ldap3`; tests substitute in-memory doubles.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use tracing::{debug, warn, Instrument};

use crate::config::{BindMechanism, SearchConfig, Transport};
use crate::error::ConnectionError;

/// `success`
const RC_SUCCESS: u32 = 0;
/// `sizeLimitExceeded`: the entries returned so far are usable.
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
/// `partialResults` (LDAPv2 referral signalling).
const RC_PARTIAL_RESULTS: u32 = 9;
/// `referral`
const RC_REFERRAL: u32 = 10;

/// Depth of a search below its base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all descendants.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// One search operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search root.
    pub base_dn: String,
    /// Search depth.
    pub scope: SearchScope,
    /// Filter with the principal already substituted.
    pub filter: String,
    /// Attributes to return.
    pub attributes: Vec<String>,
}

/// A returned directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an entry.
    pub fn new(dn: impl Into<String>, attributes: HashMap<String, Vec<String>>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Add attribute values.
    pub fn with_values<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Distinguished name.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Values of an attribute. Attribute names compare case-insensitively.
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map_or(&[], |(_, values)| values.as_slice())
    }
}

/// Outcome of a search that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResponse {
    /// The directory returned a complete result.
    Complete(Vec<DirectoryEntry>),
    /// The directory could only return a partial result, usually because
    /// answering required following a referral.
    Partial {
        /// LDAP result code.
        code: u32,
        /// Diagnostic message from the server.
        message: String,
    },
}

/// An open, bound directory connection.
#[async_trait]
pub trait DirectoryConnection: Send + 'static {
    /// Run one search.
    async fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, ConnectionError>;

    /// Unbind and close. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Opens directory connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced.
    type Connection: DirectoryConnection;

    /// Open and bind a new connection.
    async fn connect(&self) -> Result<Self::Connection, ConnectionError>;

    /// Parameters connections are opened with.
    fn params(&self) -> &ConnectionParams;
}

/// Everything needed to open a connection.
#[derive(Clone)]
pub struct ConnectionParams {
    /// Directory URL.
    pub url: String,
    /// Bind DN; anonymous when `None`.
    pub bind_dn: Option<String>,
    /// Bind password.
    pub bind_password: Option<String>,
    /// Timeout for connecting and binding.
    pub connect_timeout: Duration,
    /// Skip certificate verification. Only ever set for `ldaps` URLs.
    pub skip_tls_verify: bool,
    /// Bind mechanism, used for pool eligibility.
    pub mechanism: BindMechanism,
    /// Transport, used for pool eligibility.
    pub transport: Transport,
}

impl ConnectionParams {
    /// Derive connection parameters from a search configuration.
    ///
    /// Certificate verification is skipped only when requested and the URL
    /// uses `ldaps`; the flag is ignored for plain connections.
    pub fn from_config(config: &SearchConfig) -> Self {
        let transport = config.transport();
        Self {
            url: config.url().to_string(),
            bind_dn: config.bind_dn().map(str::to_string),
            bind_password: config.bind_password().map(str::to_string),
            connect_timeout: config.connect_timeout(),
            skip_tls_verify: config.ignore_ssl_verify() && transport == Transport::Ssl,
            mechanism: config.bind_mechanism(),
            transport,
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("mechanism", &self.mechanism)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Opens connections with `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    params: ConnectionParams,
}

impl LdapConnector {
    /// Create a connector.
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    /// Create a connector for a search configuration.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(ConnectionParams::from_config(config))
    }
}

#[async_trait]
impl Connector for LdapConnector {
    type Connection = LdapConnection;

    async fn connect(&self) -> Result<LdapConnection, ConnectionError> {
        let params = &self.params;
        let settings = LdapConnSettings::new()
            .set_conn_timeout(params.connect_timeout)
            .set_no_tls_verify(params.skip_tls_verify);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &params.url)
            .await
            .map_err(|e| ConnectionError::connect(e.to_string()))?;

        let url = params.url.clone();
        tokio::spawn(
            async move {
                if let Err(e) = conn.drive().await {
                    warn!(url = %url, error = %e, "directory connection driver stopped");
                }
            }
            .in_current_span(),
        );

        if let Some(bind_dn) = params.bind_dn.as_deref() {
            let password = params.bind_password.as_deref().unwrap_or_default();
            ldap.with_timeout(params.connect_timeout)
                .simple_bind(bind_dn, password)
                .await
                .map_err(|e| ConnectionError::bind(e.to_string()))?
                .success()
                .map_err(|e| ConnectionError::bind(e.to_string()))?;
        }

        debug!(url = %params.url, mechanism = params.mechanism.as_str(), "directory connection opened");
        Ok(LdapConnection { ldap })
    }

    fn params(&self) -> &ConnectionParams {
        &self.params
    }
}

/// A bound `ldap3` connection.
pub struct LdapConnection {
    ldap: ldap3::Ldap,
}

impl fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, ConnectionError> {
        let attributes: Vec<&str> = request.attributes.iter().map(String::as_str).collect();
        let SearchResult(entries, result) = self
            .ldap
            .search(&request.base_dn, request.scope.into(), &request.filter, attributes)
            .await
            .map_err(|e| ConnectionError::search(e.to_string()))?;

        match result.rc {
            RC_SUCCESS | RC_SIZE_LIMIT_EXCEEDED => Ok(SearchResponse::Complete(
                entries
                    .into_iter()
                    .filter(|entry| !entry.is_ref())
                    .map(SearchEntry::construct)
                    .map(|entry| DirectoryEntry::new(entry.dn, entry.attrs))
                    .collect(),
            )),
            RC_PARTIAL_RESULTS | RC_REFERRAL => Ok(SearchResponse::Partial {
                code: result.rc,
                message: result.text,
            }),
            rc => Err(ConnectionError::search(format!("rc={rc}: {}", result.text))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "unbind failed");
        }
    }
}
