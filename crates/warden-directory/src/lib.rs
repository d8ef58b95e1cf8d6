//! # Warden Directory
//!
//! Resolves a principal's group memberships from an LDAP directory.
//!
//! ## Overview
//!
//! - [`SearchConfig`] - Validated connection, search, pool and retry settings
//! - [`GroupResolver`] - Multi base DN group search with bounded retries
//! - [`ConnectionPool`] - Bounded pool of bound connections
//! - [`RetryPolicy`] - Linear backoff with optional jitter
//! - [`GroupSource`] - The seam the authorization layer consumes
//!
//! ## Example
//!
//! ```rust,no_run
//! use warden_directory::{GroupResolver, SearchConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SearchConfig::builder()
//!     .with_url("ldap://dir.example.com:389")
//!     .with_base_dns("ou=people,dc=example,dc=com")
//!     .with_filter("(uid=%s)")
//!     .with_recursive_search(true)
//!     .build()?;
//!
//! let resolver = GroupResolver::from_config(config);
//! resolver.test_connection().await?;
//!
//! let groups = resolver.resolve_groups("alice").await?;
//! println!("alice is in {groups:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure handling
//!
//! Connection acquisition is retried under `connection_retry`; running out
//! ends the resolution with [`DirectoryError::Unavailable`]. A failed search
//! discards the connection and retries the whole connect-and-search sequence
//! under `search_retry`; running out yields [`DirectoryError::Query`]. A base
//! DN with no matching entry, or with only partial results, contributes no
//! groups and is not an error.

#![doc(html_root_url = "https://docs.rs/warden-directory/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod connection;
mod error;
mod pool;
mod resolver;
mod retry;

pub use config::{
    BindMechanism, PoolConfig, SearchConfig, SearchConfigBuilder, Transport, BASE_DN_SEPARATOR,
    DEFAULT_MEMBER_ATTRIBUTE, FILTER_PLACEHOLDER,
};
pub use connection::{
    ConnectionParams, Connector, DirectoryConnection, DirectoryEntry, LdapConnection, LdapConnector,
    SearchRequest, SearchResponse, SearchScope,
};
pub use error::{ConnectionError, ConnectionErrorKind, DirectoryError, DirectoryResult};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use resolver::{GroupResolver, GroupSource, StaticGroupSource};
pub use retry::{retry, Exhausted, Failure, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL};
