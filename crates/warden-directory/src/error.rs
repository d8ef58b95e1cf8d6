//! Error types for the directory crate.

use std::fmt;
use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors surfaced by group resolution.
///
/// "No entry" and "partial results" outcomes for a single base DN are not
/// errors and never appear here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DirectoryError {
    /// No connection could be established after exhausting retries.
    #[error("failed to establish connection to '{url}' after {attempts} attempt(s): {cause}")]
    Unavailable {
        /// Directory URL.
        url: String,
        /// Number of connection attempts made.
        attempts: u32,
        /// Last connection failure.
        #[source]
        cause: ConnectionError,
    },

    /// Searching failed for a non-transient reason after exhausting retries.
    #[error("failed to find groups for user '{principal}' after {attempts} attempt(s): {cause}")]
    Query {
        /// Principal whose groups were being resolved.
        principal: String,
        /// Number of connect-and-search attempts made.
        attempts: u32,
        /// Last search failure.
        #[source]
        cause: ConnectionError,
    },

    /// The search configuration is invalid.
    #[error("invalid directory configuration: {0}")]
    InvalidConfig(String),
}

impl DirectoryError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Number of attempts made before giving up, if any were made.
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Unavailable { attempts, .. } | Self::Query { attempts, .. } => Some(*attempts),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Short label used in logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Query { .. } => "query",
            Self::InvalidConfig(_) => "config",
        }
    }
}

/// Stage at which a single connection operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Opening the transport failed.
    Connect,
    /// The bind was rejected.
    Bind,
    /// A search returned a failure result.
    Search,
    /// The operation did not finish within its timeout.
    Timeout,
    /// The pool was closed.
    Closed,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Bind => "bind",
            Self::Search => "search",
            Self::Timeout => "timeout",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// A single failed connection-level operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct ConnectionError {
    kind: ConnectionErrorKind,
    message: String,
}

impl ConnectionError {
    /// Create a connection error of the given kind.
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Opening the transport failed.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Connect, message)
    }

    /// The bind was rejected.
    pub fn bind(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Bind, message)
    }

    /// A search failed.
    pub fn search(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Search, message)
    }

    /// An operation timed out.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Timeout, message)
    }

    /// The pool was closed.
    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Closed, message)
    }

    /// Failure stage.
    pub const fn kind(&self) -> ConnectionErrorKind {
        self.kind
    }

    /// Failure detail.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = DirectoryError::Unavailable {
            url: "ldap://dir:389".to_string(),
            attempts: 3,
            cause: ConnectionError::connect("connection refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("ldap://dir:389"));
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("connection refused"));
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_query_display() {
        let err = DirectoryError::Query {
            principal: "alice".to_string(),
            attempts: 2,
            cause: ConnectionError::search("rc=53 unwilling to perform"),
        };
        assert!(err.to_string().contains("user 'alice'"));
        assert_eq!(err.kind(), "query");
    }

    #[test]
    fn test_connection_error_kind() {
        let err = ConnectionError::timeout("after 5s");
        assert_eq!(err.kind(), ConnectionErrorKind::Timeout);
        assert_eq!(err.to_string(), "timeout error: after 5s");
    }

    #[test]
    fn test_invalid_config_has_no_attempts() {
        let err = DirectoryError::invalid_config("url is required");
        assert_eq!(err.attempts(), None);
        assert!(err.to_string().contains("url is required"));
    }
}
