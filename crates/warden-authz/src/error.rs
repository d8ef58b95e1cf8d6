//! Error types for the authorization crate.

use thiserror::Error;
use warden_directory::DirectoryError;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur during authorization.
///
/// A denied permission is never an error; it is a [`Decision`](crate::Decision).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// The role catalog is inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Group resolution failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl AuthzError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this error came from infrastructure rather than configuration.
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Attempts made before giving up, for directory failures.
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Directory(err) => err.attempts(),
            Self::Configuration(_) => None,
        }
    }

    /// Short label used in logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Directory(err) => err.kind(),
            Self::Configuration(_) => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_directory::ConnectionError;

    #[test]
    fn test_configuration_error() {
        let err = AuthzError::configuration("group 'admins' references unknown role 'root'");
        assert!(!err.is_infrastructure());
        assert_eq!(
            err.to_string(),
            "configuration error: group 'admins' references unknown role 'root'"
        );
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_directory_error_is_infrastructure() {
        let err: AuthzError = DirectoryError::Unavailable {
            url: "ldap://dir".to_string(),
            attempts: 3,
            cause: ConnectionError::connect("refused"),
        }
        .into();
        assert!(err.is_infrastructure());
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.kind(), "unavailable");
        assert!(err.to_string().contains("after 3 attempt(s)"));
    }
}
