//! Bounded connection pool.
//!
//! Checked-out connections are limited by a semaphore when `max_size` is set.
//! Released connections go back to an idle list if they are healthy, eligible
//! under the pool's authentication and protocol lists, and the idle list has
//! room. The idle list lock is never held across an await.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::config::PoolConfig;
use crate::connection::{Connector, DirectoryConnection, SearchRequest, SearchResponse};
use crate::error::ConnectionError;

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections opened.
    pub created: u64,
    /// Checkouts served from the idle list.
    pub reused: u64,
    /// Connections closed instead of being returned.
    pub discarded: u64,
    /// Connections currently idle.
    pub idle: usize,
}

struct Idle<T> {
    conn: T,
    since: Instant,
}

struct PoolInner<C: Connector> {
    connector: C,
    config: PoolConfig,
    poolable: bool,
    idle: Mutex<Vec<Idle<C::Connection>>>,
    permits: Option<Arc<Semaphore>>,
    closed: AtomicBool,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

impl<C: Connector> PoolInner<C> {
    fn idle_limit(&self) -> usize {
        match (self.config.pref_size, self.config.max_size) {
            (0, 0) => usize::MAX,
            (0, max) => max,
            (pref, _) => pref,
        }
    }

    fn is_expired(&self, since: Instant) -> bool {
        self.config
            .idle_timeout
            .is_some_and(|timeout| since.elapsed() >= timeout)
    }

    fn log(&self, event: &'static str) {
        if self.config.debug_enabled() {
            debug!(url = %self.connector.params().url, event, "directory pool");
        }
    }

    /// Pop a fresh idle connection, collecting expired ones for closing.
    fn take_idle(&self) -> (Option<C::Connection>, Vec<C::Connection>) {
        let mut idle = self.idle.lock();
        let mut expired = Vec::new();
        while let Some(entry) = idle.pop() {
            if self.is_expired(entry.since) {
                expired.push(entry.conn);
            } else {
                return (Some(entry.conn), expired);
            }
        }
        (None, expired)
    }

    /// Return a connection to the idle list, or hand it back if it can't stay.
    fn put_idle(&self, conn: C::Connection) -> Option<C::Connection> {
        if !self.poolable || self.closed.load(Ordering::Acquire) {
            return Some(conn);
        }
        let mut idle = self.idle.lock();
        if idle.len() >= self.idle_limit() {
            return Some(conn);
        }
        idle.push(Idle {
            conn,
            since: Instant::now(),
        });
        None
    }

    fn discard(&self, conn: C::Connection) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        self.log("closed");
        close_detached(conn);
    }
}

fn close_detached<T: DirectoryConnection>(mut conn: T) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move { conn.close().await });
    }
}

/// A bounded pool of directory connections.
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("url", &self.inner.connector.params().url)
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Create a pool. No connections are opened until [`warm_up`](Self::warm_up)
    /// or the first [`acquire`](Self::acquire).
    pub fn new(connector: C, config: PoolConfig) -> Self {
        let params = connector.params();
        let poolable = config.is_poolable(params.mechanism, params.transport);
        let permits = (config.max_size > 0).then(|| Arc::new(Semaphore::new(config.max_size)));
        Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                poolable,
                idle: Mutex::new(Vec::new()),
                permits,
                closed: AtomicBool::new(false),
                created: AtomicU64::new(0),
                reused: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// The connector connections are opened with.
    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// Whether released connections can be reused.
    pub fn is_poolable(&self) -> bool {
        self.inner.poolable
    }

    /// Open `init_size` connections into the idle list.
    ///
    /// Returns how many were kept. Nothing is opened for a pool whose
    /// connections are not eligible for reuse.
    pub async fn warm_up(&self) -> Result<usize, ConnectionError> {
        if !self.inner.poolable {
            return Ok(0);
        }
        let target = self.inner.config.init_size.min(self.inner.idle_limit());
        let mut kept = 0;
        while kept < target {
            let conn = self.open().await?;
            if let Some(conn) = self.inner.put_idle(conn) {
                self.inner.discard(conn);
                break;
            }
            kept += 1;
        }
        Ok(kept)
    }

    /// Check out a connection, reusing an idle one when possible.
    ///
    /// Waits for a permit when `max_size` connections are checked out.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, ConnectionError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::closed("connection pool is closed"));
        }

        let permit = match &self.inner.permits {
            Some(permits) => Some(
                Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| ConnectionError::closed("connection pool is closed"))?,
            ),
            None => None,
        };

        let (reusable, expired) = self.inner.take_idle();
        for conn in expired {
            self.inner.discard(conn);
        }

        let conn = match reusable {
            Some(conn) => {
                self.inner.reused.fetch_add(1, Ordering::Relaxed);
                self.inner.log("reused");
                conn
            }
            None => self.open().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            permit,
            broken: false,
        })
    }

    async fn open(&self) -> Result<C::Connection, ConnectionError> {
        let conn = self.inner.connector.connect().await?;
        self.inner.created.fetch_add(1, Ordering::Relaxed);
        self.inner.log("created");
        Ok(conn)
    }

    /// Close every idle connection, so the next checkout opens a new one.
    ///
    /// Returns how many were closed.
    pub fn purge_idle(&self) -> usize {
        let drained: Vec<_> = self.inner.idle.lock().drain(..).collect();
        let count = drained.len();
        for entry in drained {
            self.inner.discard(entry.conn);
        }
        if count > 0 {
            self.inner.log("idle purged");
        }
        count
    }

    /// Close the pool and every idle connection.
    ///
    /// Checked-out connections are closed when released.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(permits) = &self.inner.permits {
            permits.close();
        }
        let drained: Vec<_> = self.inner.idle.lock().drain(..).collect();
        for mut entry in drained {
            entry.conn.close().await;
        }
        self.inner.log("pool closed");
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.inner.created.load(Ordering::Relaxed),
            reused: self.inner.reused.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
            idle: self.inner.idle.lock().len(),
        }
    }
}

/// A checked-out connection, returned to the pool on drop.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    pool: Arc<PoolInner<C>>,
    permit: Option<OwnedSemaphorePermit>,
    broken: bool,
}

impl<C: Connector> PooledConnection<C> {
    /// Run a search on the underlying connection.
    pub async fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, ConnectionError> {
        match self.conn.as_mut() {
            Some(conn) => conn.search(request).await,
            None => Err(ConnectionError::closed("connection already released")),
        }
    }

    /// Mark the connection unusable so it is closed instead of pooled.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Close the connection now instead of returning it to the pool.
    pub fn discard(mut self) {
        self.broken = true;
        drop(self);
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.broken {
                self.pool.discard(conn);
            } else if let Some(conn) = self.pool.put_idle(conn) {
                self.pool.discard(conn);
            } else {
                self.pool.log("returned");
            }
        }
        // Release the checkout slot only after the connection is back.
        drop(self.permit.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindMechanism, Transport};
    use crate::connection::ConnectionParams;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingConnection {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DirectoryConnection for CountingConnection {
        async fn search(&mut self, _request: &SearchRequest) -> Result<SearchResponse, ConnectionError> {
            Ok(SearchResponse::Complete(Vec::new()))
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingConnector {
        params: ConnectionParams,
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl CountingConnector {
        fn new(transport: Transport) -> Self {
            Self {
                params: ConnectionParams {
                    url: "ldap://mock".to_string(),
                    bind_dn: Some("cn=lookup".to_string()),
                    bind_password: None,
                    connect_timeout: Duration::from_secs(1),
                    skip_tls_verify: false,
                    mechanism: BindMechanism::Simple,
                    transport,
                },
                connects: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Connector for CountingConnector {
        type Connection = CountingConnection;

        async fn connect(&self) -> Result<CountingConnection, ConnectionError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(CountingConnection {
                closes: Arc::clone(&self.closes),
            })
        }

        fn params(&self) -> &ConnectionParams {
            &self.params
        }
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), PoolConfig::default());
        drop(pool.acquire().await.unwrap());
        drop(pool.acquire().await.unwrap());

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 1);
    }

    #[tokio::test]
    async fn test_purge_idle() {
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), PoolConfig::default());
        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        drop(first);
        drop(second);
        assert_eq!(pool.stats().idle, 2);

        assert_eq!(pool.purge_idle(), 2);
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().discarded, 2);

        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.stats().created, 3);
        assert_eq!(pool.purge_idle(), 1);
    }

    #[tokio::test]
    async fn test_discarded_connection_is_not_reused() {
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), PoolConfig::default());
        pool.acquire().await.unwrap().discard();
        drop(pool.acquire().await.unwrap());

        let stats = pool.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.discarded, 1);
    }

    #[tokio::test]
    async fn test_ineligible_transport_is_not_pooled() {
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Ssl), PoolConfig::default());
        assert!(!pool.is_poolable());
        drop(pool.acquire().await.unwrap());
        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.stats().created, 2);
        assert_eq!(pool.stats().idle, 0);
    }

    #[tokio::test]
    async fn test_warm_up_opens_init_size() {
        let config = PoolConfig::new().with_init_size(3).with_max_size(2).with_pref_size(2);
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), config);
        assert_eq!(pool.warm_up().await.unwrap(), 2);
        assert_eq!(pool.stats().idle, 2);
    }

    #[tokio::test]
    async fn test_pref_size_bounds_idle() {
        let config = PoolConfig::new().with_pref_size(1);
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), config);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);
        drop(b);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.discarded, 1);
    }

    #[tokio::test]
    async fn test_max_size_blocks_checkout() {
        let config = PoolConfig::new().with_max_size(1);
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), config);
        let held = pool.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
        assert!(waiting.is_err());

        drop(held);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_expires_connections() {
        let config = PoolConfig::new().with_idle_timeout(Duration::from_secs(5));
        let pool = ConnectionPool::new(CountingConnector::new(Transport::Plain), config);
        drop(pool.acquire().await.unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;
        drop(pool.acquire().await.unwrap());

        let stats = pool.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.reused, 0);
        assert_eq!(stats.discarded, 1);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let connector = CountingConnector::new(Transport::Plain);
        let closes = Arc::clone(&connector.closes);
        let pool = ConnectionPool::new(connector, PoolConfig::default());
        drop(pool.acquire().await.unwrap());

        pool.close().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(pool.acquire().await.is_err());
    }
}
