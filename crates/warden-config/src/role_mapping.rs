//! Role mapping YAML.
//!
//! ```yaml
//! roles:
//!   - name: admin
//!     permissions:
//!       - { entityType: NAMESPACE, permission: GET }
//!       - { entityType: NAMESPACE, permission: UPDATE, namespaceOnly: true }
//! mappings:
//!   - group: admins
//!     roles: [admin]
//!     namespaces: ["*"]
//! ```
//!
//! Both lists may be omitted. A mapping without `namespaces` applies
//! everywhere; an empty `namespaces` list is rejected. Converting to a
//! catalog also rejects duplicate role names, duplicate groups and
//! references to undefined roles.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_authz::{GroupWithRoles, Role, RoleGroupCatalog};

use crate::ConfigError;

/// The parsed content of a role mapping file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleMappingFile {
    /// Role definitions.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Group to role mappings.
    #[serde(default)]
    pub mappings: Vec<GroupWithRoles>,
}

impl RoleMappingFile {
    /// Parse YAML content. Blank content is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::YamlError` for malformed YAML or unknown
    /// entity types and permissions.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read and parse a role mapping file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable or malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        Self::parse(&content)
    }

    /// Whether neither roles nor mappings are defined.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.mappings.is_empty()
    }

    /// Build a validated catalog.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::RoleMapping` for duplicates or dangling role
    /// references.
    pub fn into_catalog(self) -> Result<RoleGroupCatalog, ConfigError> {
        Ok(RoleGroupCatalog::new(self.roles, self.mappings)?)
    }
}

/// Read a role mapping file straight into a catalog.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed or validated.
pub fn load_role_catalog<P: AsRef<Path>>(path: P) -> Result<RoleGroupCatalog, ConfigError> {
    RoleMappingFile::from_file(path)?.into_catalog()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_authz::NamespaceScope;
    use warden_core::{EntityType, Permission};

    const MAPPING: &str = r#"
roles:
  - name: admin
    permissions:
      - { entityType: NAMESPACE, permission: GET }
      - { entityType: NAMESPACE, permission: UPDATE, namespaceOnly: true }
  - name: viewer
    permissions:
      - entityType: DATASET
        permission: READ
mappings:
  - group: admins
    roles: [admin]
  - group: analysts
    roles: [viewer]
    namespaces: [test, prod]
"#;

    #[test]
    fn test_parse_mapping() {
        let file = RoleMappingFile::parse(MAPPING).unwrap();
        assert_eq!(file.roles.len(), 2);
        assert_eq!(file.mappings.len(), 2);
        assert_eq!(file.mappings[0].namespaces, NamespaceScope::All);
        assert_eq!(file.mappings[1].namespaces, NamespaceScope::only(["test", "prod"]));

        let catalog = file.into_catalog().unwrap();
        let admin = catalog.role("admin").unwrap();
        assert_eq!(admin.permissions.len(), 2);
        assert!(admin.permissions.iter().any(|p| p.namespace_only));

        let viewer = catalog.role("viewer").unwrap();
        assert!(viewer
            .permissions
            .iter()
            .all(|p| p.entity_type == EntityType::Dataset && p.permission == Permission::Get));
    }

    #[test]
    fn test_blank_content_is_empty() {
        let file = RoleMappingFile::parse("  \n").unwrap();
        assert!(file.is_empty());
        assert_eq!(file.into_catalog().unwrap().role_count(), 0);
    }

    #[test]
    fn test_dangling_role_is_rejected() {
        let yaml = "roles: []\nmappings:\n  - group: admins\n    roles: [root]\n";
        let err = RoleMappingFile::parse(yaml).unwrap().into_catalog().unwrap_err();
        assert!(matches!(err, ConfigError::RoleMapping(_)));
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_empty_namespace_list_is_rejected() {
        let yaml = "roles:\n  - name: admin\n    permissions: []\nmappings:\n  - group: admins\n    roles: [admin]\n    namespaces: []\n";
        let file = RoleMappingFile::parse(yaml).unwrap();
        assert_eq!(file.mappings[0].namespaces, NamespaceScope::only(Vec::<String>::new()));
        let err = file.into_catalog().unwrap_err();
        assert!(matches!(err, ConfigError::RoleMapping(_)));
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        let yaml = "roles:\n  - name: r\n    permissions:\n      - { entityType: NAMESPACE, permission: FLY }\n";
        assert!(matches!(
            RoleMappingFile::parse(yaml),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_unknown_top_level_key_is_rejected() {
        assert!(RoleMappingFile::parse("rolez: []\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_role_catalog("/nonexistent/roles.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
