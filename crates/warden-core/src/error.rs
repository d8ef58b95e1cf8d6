//! Error types for the core model.

use thiserror::Error;

use crate::EntityType;

/// Result type for core model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing or constructing core model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// The entity type name is not recognized.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// The permission name is not recognized.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// A namespace-scoped entity was constructed without a namespace.
    #[error("entity type {0} requires a namespace")]
    NamespaceRequired(EntityType),

    /// A namespace was supplied for an entity type that is not namespace scoped.
    #[error("entity type {0} is not namespace scoped")]
    NamespaceNotAllowed(EntityType),

    /// A name component was empty.
    #[error("empty {0} name")]
    EmptyName(&'static str),
}

impl CoreError {
    /// Create an unknown entity type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType(name.into())
    }

    /// Create an unknown permission error.
    pub fn unknown_permission(name: impl Into<String>) -> Self {
        Self::UnknownPermission(name.into())
    }
}
