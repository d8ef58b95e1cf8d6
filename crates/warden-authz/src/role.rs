//! Roles and group to role mappings.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::{EntityType, Permission};

/// A permission on every entity of one type.
///
/// `namespace_only` grants apply to the namespace entity itself and are
/// never propagated to the namespace's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeWithPermission {
    /// Entity type the permission applies to.
    pub entity_type: EntityType,
    /// The permission.
    pub permission: Permission,
    /// Restrict the grant to the namespace entity itself.
    #[serde(default)]
    pub namespace_only: bool,
}

impl EntityTypeWithPermission {
    /// A grant that propagates normally.
    pub const fn new(entity_type: EntityType, permission: Permission) -> Self {
        Self {
            entity_type,
            permission,
            namespace_only: false,
        }
    }

    /// A grant restricted to the namespace entity.
    pub const fn namespace_only(entity_type: EntityType, permission: Permission) -> Self {
        Self {
            entity_type,
            permission,
            namespace_only: true,
        }
    }
}

impl fmt::Display for EntityTypeWithPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}", self.entity_type, self.permission)?;
        if self.namespace_only {
            f.write_str(", namespace only")?;
        }
        f.write_str(")")
    }
}

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name.
    pub name: String,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: BTreeSet<EntityTypeWithPermission>,
}

impl Role {
    /// Create a role.
    pub fn new(
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = EntityTypeWithPermission>,
    ) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().collect(),
        }
    }
}

/// Literal that stands for every namespace in a namespace list.
pub const ALL_NAMESPACES: &str = "*";

/// The namespaces a group's roles apply in.
///
/// Written as a list of namespace names. An omitted list, or one containing
/// `"*"`, means every namespace. An empty list means none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum NamespaceScope {
    /// Every namespace.
    #[default]
    All,
    /// Only the listed namespaces.
    Only(BTreeSet<String>),
}

impl NamespaceScope {
    /// Scope limited to the given namespaces.
    pub fn only<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from(namespaces.into_iter().map(Into::into).collect::<Vec<String>>())
    }

    /// Whether the scope covers a namespace.
    pub fn contains(&self, namespace: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(namespaces) => namespaces.contains(namespace),
        }
    }
}

impl From<Vec<String>> for NamespaceScope {
    /// `"*"` anywhere in the list covers every namespace. Blank entries are
    /// dropped, so an empty or blank list covers none.
    fn from(namespaces: Vec<String>) -> Self {
        let namespaces: BTreeSet<String> = namespaces
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        if namespaces.contains(ALL_NAMESPACES) {
            Self::All
        } else {
            Self::Only(namespaces)
        }
    }
}

impl From<NamespaceScope> for Vec<String> {
    fn from(scope: NamespaceScope) -> Self {
        match scope {
            NamespaceScope::All => vec![ALL_NAMESPACES.to_string()],
            NamespaceScope::Only(namespaces) => namespaces.into_iter().collect(),
        }
    }
}

/// The roles a directory group confers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWithRoles {
    /// Directory group name, compared exactly.
    pub group: String,
    /// Names of conferred roles.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Where the conferred roles apply.
    #[serde(default)]
    pub namespaces: NamespaceScope,
}

impl GroupWithRoles {
    /// A mapping that applies in every namespace.
    pub fn new<I, S>(group: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group: group.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            namespaces: NamespaceScope::All,
        }
    }

    /// Restrict the mapping to a namespace scope.
    pub fn with_namespaces(mut self, namespaces: NamespaceScope) -> Self {
        self.namespaces = namespaces;
        self
    }
}
