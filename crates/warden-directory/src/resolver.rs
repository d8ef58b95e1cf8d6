//! Principal to group resolution.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use async_trait::async_trait;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument};
use warden_core::Principal;

use crate::config::SearchConfig;
use crate::connection::{Connector, LdapConnector, SearchRequest, SearchResponse};
use crate::error::{ConnectionError, ConnectionErrorKind, DirectoryError, DirectoryResult};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::retry::{retry, Exhausted, Failure};

/// Something that can tell which groups a principal belongs to.
#[async_trait]
pub trait GroupSource: Send + Sync + 'static {
    /// Resolve the principal's groups.
    async fn groups_for(&self, principal: &Principal) -> DirectoryResult<BTreeSet<String>>;

    /// Check connectivity once, without retrying.
    async fn probe(&self) -> DirectoryResult<()>;
}

/// Why one connect-and-search attempt failed.
#[derive(Debug)]
enum AttemptError {
    /// Connection retries ran out; ends the resolution.
    Unavailable { attempts: u32, cause: ConnectionError },
    /// A search failed; the whole attempt may be retried.
    Search(ConnectionError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { attempts, cause } => {
                write!(f, "no connection after {attempts} attempt(s): {cause}")
            }
            Self::Search(cause) => cause.fmt(f),
        }
    }
}

/// Resolves group memberships from a directory.
///
/// Each resolution acquires one pooled connection and searches every base DN
/// in order with it. The member attribute of the first entry found under a
/// base DN contributes to the result; base DNs with no entry or only a
/// partial result contribute nothing. Any other search failure discards the
/// connection and retries the whole sequence.
pub struct GroupResolver<C: Connector = LdapConnector> {
    config: SearchConfig,
    pool: ConnectionPool<C>,
}

impl<C: Connector> fmt::Debug for GroupResolver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupResolver")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

impl GroupResolver<LdapConnector> {
    /// Create a resolver backed by `ldap3`.
    pub fn from_config(config: SearchConfig) -> Self {
        let connector = LdapConnector::from_config(&config);
        Self::new(config, connector)
    }
}

impl<C: Connector> GroupResolver<C> {
    /// Create a resolver with a custom connector.
    pub fn new(config: SearchConfig, connector: C) -> Self {
        let pool = ConnectionPool::new(connector, config.pool().clone());
        Self { config, pool }
    }

    /// The search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The connection pool.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// Open the pool's initial connections.
    pub async fn warm_up(&self) -> DirectoryResult<usize> {
        self.pool
            .warm_up()
            .await
            .map_err(|cause| self.unavailable(1, cause))
    }

    /// Open and release one connection, without retrying.
    #[instrument(skip(self), fields(url = %self.config.url()))]
    pub async fn test_connection(&self) -> DirectoryResult<()> {
        let conn = self
            .acquire_once()
            .await
            .map_err(|cause| self.unavailable(1, cause))?;
        drop(conn);
        info!("directory connection test succeeded");
        Ok(())
    }

    /// Resolve a principal's groups, retrying per the configured policies.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_groups(&self, principal: &str) -> DirectoryResult<BTreeSet<String>> {
        self.resolve(principal, None).await
    }

    /// Like [`resolve_groups`](Self::resolve_groups), but gives up instead of
    /// starting a backoff that would end after `deadline`.
    #[instrument(skip(self, deadline), level = "debug")]
    pub async fn resolve_groups_until(
        &self,
        principal: &str,
        deadline: Instant,
    ) -> DirectoryResult<BTreeSet<String>> {
        self.resolve(principal, Some(deadline)).await
    }

    async fn resolve(&self, principal: &str, deadline: Option<Instant>) -> DirectoryResult<BTreeSet<String>> {
        let filter = self.config.filter_for(principal);
        let filter = filter.as_str();

        let outcome = retry(self.config.search_retry(), deadline, "directory search", |_| async move {
            self.attempt(filter, deadline).await
        })
        .await;

        match outcome {
            Ok(groups) => {
                debug!(count = groups.len(), "resolved groups");
                Ok(groups)
            }
            Err(Exhausted {
                error: AttemptError::Unavailable { attempts, cause },
                ..
            }) => Err(self.unavailable(attempts, cause)),
            Err(Exhausted {
                attempts,
                error: AttemptError::Search(cause),
            }) => Err(DirectoryError::Query {
                principal: principal.to_string(),
                attempts,
                cause,
            }),
        }
    }

    async fn attempt(&self, filter: &str, deadline: Option<Instant>) -> Result<BTreeSet<String>, Failure<AttemptError>> {
        let mut conn = self.acquire(deadline).await.map_err(|exhausted| {
            Failure::Abort(AttemptError::Unavailable {
                attempts: exhausted.attempts,
                cause: exhausted.error,
            })
        })?;

        let limit = self.config.attempt_timeout();
        let cause = match timeout(limit, self.search_all(&mut conn, filter)).await {
            Ok(Ok(groups)) => return Ok(groups),
            Ok(Err(cause)) => cause,
            Err(_) => ConnectionError::timeout(format!("searches did not finish within {limit:?}")),
        };
        // Idle connections may share the failed one's fate; retry on a new one.
        conn.discard();
        let purged = self.pool.purge_idle();
        debug!(purged, error = %cause, "search attempt failed, reconnecting");
        Err(Failure::Retry(AttemptError::Search(cause)))
    }

    async fn acquire(&self, deadline: Option<Instant>) -> Result<PooledConnection<C>, Exhausted<ConnectionError>> {
        retry(self.config.connection_retry(), deadline, "directory connect", |_| async move {
            match self.acquire_once().await {
                Ok(conn) => Ok(conn),
                Err(e) if e.kind() == ConnectionErrorKind::Closed => Err(Failure::Abort(e)),
                Err(e) => Err(Failure::Retry(e)),
            }
        })
        .await
    }

    async fn acquire_once(&self) -> Result<PooledConnection<C>, ConnectionError> {
        let limit = self.config.connect_timeout();
        match timeout(limit, self.pool.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::timeout(format!(
                "no connection within {limit:?}"
            ))),
        }
    }

    async fn search_all(
        &self,
        conn: &mut PooledConnection<C>,
        filter: &str,
    ) -> Result<BTreeSet<String>, ConnectionError> {
        let attribute = self.config.member_attribute();
        let mut groups = BTreeSet::new();

        for base_dn in self.config.base_dns() {
            let request = SearchRequest {
                base_dn: base_dn.clone(),
                scope: self.config.scope(),
                filter: filter.to_string(),
                attributes: vec![attribute.to_string()],
            };

            match conn.search(&request).await? {
                SearchResponse::Complete(entries) => match entries.first() {
                    Some(entry) => {
                        let values = entry.values(attribute);
                        debug!(%base_dn, dn = entry.dn(), count = values.len(), "found principal entry");
                        groups.extend(values.iter().cloned());
                    }
                    None => debug!(%base_dn, "no entry for principal"),
                },
                SearchResponse::Partial { code, message } => {
                    debug!(%base_dn, code, %message, "partial results, no groups taken");
                }
            }
        }

        Ok(groups)
    }

    fn unavailable(&self, attempts: u32, cause: ConnectionError) -> DirectoryError {
        DirectoryError::Unavailable {
            url: self.config.url().to_string(),
            attempts,
            cause,
        }
    }
}

#[async_trait]
impl<C: Connector> GroupSource for GroupResolver<C> {
    async fn groups_for(&self, principal: &Principal) -> DirectoryResult<BTreeSet<String>> {
        self.resolve_groups(principal.name()).await
    }

    async fn probe(&self) -> DirectoryResult<()> {
        self.test_connection().await
    }
}

/// A fixed principal to groups table.
///
/// Useful for tests and for deployments without a directory. Unknown
/// principals resolve to no groups.
#[derive(Debug, Clone, Default)]
pub struct StaticGroupSource {
    groups: HashMap<String, BTreeSet<String>>,
}

impl StaticGroupSource {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add groups for a principal.
    pub fn with_groups<I, S>(mut self, principal: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .entry(principal.into())
            .or_default()
            .extend(groups.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl GroupSource for StaticGroupSource {
    async fn groups_for(&self, principal: &Principal) -> DirectoryResult<BTreeSet<String>> {
        Ok(self.groups.get(principal.name()).cloned().unwrap_or_default())
    }

    async fn probe(&self) -> DirectoryResult<()> {
        Ok(())
    }
}
