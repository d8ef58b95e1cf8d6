//! Entity model.
//!
//! Entities are the targets of authorization checks. Every entity has an
//! [`EntityType`]; namespace-scoped types additionally belong to exactly one
//! namespace. Entities whose type is not namespace scoped (the instance,
//! system services, Kerberos principals) are treated as living in the
//! reserved [`SYSTEM_NAMESPACE`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Name of the reserved system namespace.
pub const SYSTEM_NAMESPACE: &str = "system";

/// Category of an authorizable entity.
///
/// The set is closed: decisions that depend on the entity type match on it
/// exhaustively instead of inspecting types at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// The whole installation.
    Instance,
    /// A namespace. Its owning namespace is itself.
    Namespace,
    /// A deployed application.
    Application,
    /// A program inside an application.
    Program,
    /// A dataset instance.
    Dataset,
    /// A dataset module.
    DatasetModule,
    /// A dataset type.
    DatasetType,
    /// A plugin or application artifact.
    Artifact,
    /// A secure key holding secret material.
    #[serde(rename = "SECUREKEY")]
    SecureKey,
    /// A compute profile, which can expose credentials such as SSH keys.
    Profile,
    /// A platform system service.
    SystemService,
    /// A Kerberos principal.
    #[serde(rename = "KERBEROSPRINCIPAL")]
    KerberosPrincipal,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: [EntityType; 12] = [
        Self::Instance,
        Self::Namespace,
        Self::Application,
        Self::Program,
        Self::Dataset,
        Self::DatasetModule,
        Self::DatasetType,
        Self::Artifact,
        Self::SecureKey,
        Self::Profile,
        Self::SystemService,
        Self::KerberosPrincipal,
    ];

    /// Canonical upper-case name, as used in role mapping files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "INSTANCE",
            Self::Namespace => "NAMESPACE",
            Self::Application => "APPLICATION",
            Self::Program => "PROGRAM",
            Self::Dataset => "DATASET",
            Self::DatasetModule => "DATASET_MODULE",
            Self::DatasetType => "DATASET_TYPE",
            Self::Artifact => "ARTIFACT",
            Self::SecureKey => "SECUREKEY",
            Self::Profile => "PROFILE",
            Self::SystemService => "SYSTEM_SERVICE",
            Self::KerberosPrincipal => "KERBEROSPRINCIPAL",
        }
    }

    /// Whether entities of this type carry a namespace attribute.
    pub const fn is_namespace_scoped(&self) -> bool {
        match self {
            Self::Namespace
            | Self::Application
            | Self::Program
            | Self::Dataset
            | Self::DatasetModule
            | Self::DatasetType
            | Self::Artifact
            | Self::SecureKey
            | Self::Profile => true,
            Self::Instance | Self::SystemService | Self::KerberosPrincipal => false,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::unknown_entity_type(wanted))
    }
}

/// A concrete authorizable entity.
///
/// `parts` holds the entity's own path below its namespace, outermost first
/// (for a program: application name, then program name).
///
/// # Example
///
/// ```
/// use warden_core::{EntityId, EntityType};
///
/// let artifact = EntityId::artifact("test", "test-1.0.jar");
/// assert_eq!(artifact.entity_type(), EntityType::Artifact);
/// assert_eq!(artifact.namespace(), Some("test"));
///
/// let instance = EntityId::instance("main");
/// assert_eq!(instance.owning_namespace(), "system");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntityId")]
pub struct EntityId {
    entity_type: EntityType,
    namespace: Option<String>,
    parts: Vec<String>,
}

/// Wire form of [`EntityId`], checked by [`EntityId::new`] on the way in.
#[derive(Deserialize)]
struct RawEntityId {
    entity_type: EntityType,
    namespace: Option<String>,
    #[serde(default)]
    parts: Vec<String>,
}

impl TryFrom<RawEntityId> for EntityId {
    type Error = CoreError;

    fn try_from(raw: RawEntityId) -> CoreResult<Self> {
        Self::new(raw.entity_type, raw.namespace.as_deref(), raw.parts)
    }
}

impl EntityId {
    /// Build an entity, checking that the namespace matches the type's scoping.
    ///
    /// For [`EntityType::Namespace`] the namespace is the entity itself and
    /// `parts` must be empty.
    pub fn new(
        entity_type: EntityType,
        namespace: Option<&str>,
        parts: impl IntoIterator<Item = impl Into<String>>,
    ) -> CoreResult<Self> {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.iter().any(String::is_empty) {
            return Err(CoreError::EmptyName("entity"));
        }

        match (entity_type.is_namespace_scoped(), namespace) {
            (true, None) => Err(CoreError::NamespaceRequired(entity_type)),
            (true, Some("")) => Err(CoreError::EmptyName("namespace")),
            (false, Some(_)) => Err(CoreError::NamespaceNotAllowed(entity_type)),
            (true, Some(ns)) => {
                if entity_type != EntityType::Namespace && parts.is_empty() {
                    return Err(CoreError::EmptyName("entity"));
                }
                Ok(Self {
                    entity_type,
                    namespace: Some(ns.to_string()),
                    parts: if entity_type == EntityType::Namespace {
                        Vec::new()
                    } else {
                        parts
                    },
                })
            }
            (false, None) => {
                if parts.is_empty() {
                    return Err(CoreError::EmptyName("entity"));
                }
                Ok(Self {
                    entity_type,
                    namespace: None,
                    parts,
                })
            }
        }
    }

    /// The installation instance.
    pub fn instance(name: impl Into<String>) -> Self {
        Self::unscoped(EntityType::Instance, name)
    }

    /// A namespace.
    pub fn namespace_entity(name: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::Namespace,
            namespace: Some(name.into()),
            parts: Vec::new(),
        }
    }

    /// An artifact in a namespace.
    pub fn artifact(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::scoped(EntityType::Artifact, namespace, vec![name.into()])
    }

    /// An application in a namespace.
    pub fn application(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::scoped(EntityType::Application, namespace, vec![name.into()])
    }

    /// A program of an application.
    pub fn program(
        namespace: impl Into<String>,
        application: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::scoped(
            EntityType::Program,
            namespace,
            vec![application.into(), name.into()],
        )
    }

    /// A dataset in a namespace.
    pub fn dataset(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::scoped(EntityType::Dataset, namespace, vec![name.into()])
    }

    /// A secure key in a namespace.
    pub fn secure_key(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::scoped(EntityType::SecureKey, namespace, vec![name.into()])
    }

    /// A compute profile in a namespace.
    pub fn profile(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::scoped(EntityType::Profile, namespace, vec![name.into()])
    }

    /// A system service.
    pub fn system_service(name: impl Into<String>) -> Self {
        Self::unscoped(EntityType::SystemService, name)
    }

    /// A Kerberos principal.
    pub fn kerberos_principal(name: impl Into<String>) -> Self {
        Self::unscoped(EntityType::KerberosPrincipal, name)
    }

    fn scoped(entity_type: EntityType, namespace: impl Into<String>, parts: Vec<String>) -> Self {
        Self {
            entity_type,
            namespace: Some(namespace.into()),
            parts,
        }
    }

    fn unscoped(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            namespace: None,
            parts: vec![name.into()],
        }
    }

    /// The entity's type.
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// The namespace attribute, if the entity carries one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The namespace this entity belongs to for authorization purposes.
    ///
    /// Entities without a namespace attribute belong to [`SYSTEM_NAMESPACE`].
    pub fn owning_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(SYSTEM_NAMESPACE)
    }

    /// Path components below the namespace.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Whether this entity is a namespace.
    pub fn is_namespace(&self) -> bool {
        self.entity_type == EntityType::Namespace
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.entity_type.as_str().to_ascii_lowercase())?;
        let mut first = true;
        for component in self.namespace.iter().chain(self.parts.iter()) {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(component)?;
            first = false;
        }
        Ok(())
    }
}
