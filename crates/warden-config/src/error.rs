//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;
use warden_authz::AuthzError;
use warden_directory::DirectoryError;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed property file line.
    #[error("malformed property on line {line}: {reason}")]
    PropertySyntax {
        /// One-based line number.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Role mapping YAML parsing error.
    #[error("failed to parse role mapping: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// Missing required field.
    #[error("missing required configuration field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// The directory settings were rejected.
    #[error("invalid directory settings: {0}")]
    Directory(#[from] DirectoryError),

    /// The role mapping is inconsistent.
    #[error("invalid role mapping: {0}")]
    RoleMapping(#[from] AuthzError),

    /// A secret store lookup failed.
    #[error("secret '{name}' could not be read: {reason}")]
    Secret {
        /// Secret name.
        name: String,
        /// Explanation of the failure.
        reason: String,
    },

    /// Invalid configuration for a component.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new property syntax error.
    pub fn property_syntax(line: usize, reason: impl Into<String>) -> Self {
        Self::PropertySyntax {
            line,
            reason: reason.into(),
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new secret lookup error.
    pub fn secret(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Secret {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
