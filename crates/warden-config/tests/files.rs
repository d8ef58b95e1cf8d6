//! Loading configuration and role mappings from disk.

use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use warden_config::{
    load_role_catalog, ConfigError, ConfigLoader, MapSecretStore, RoleMappingFile, LDAP_BIND_PASS,
};

const PROPERTIES: &str = r"# Directory
url=ldaps://dir.example.com:636
searchBaseDn=ou=people,dc=example,dc=com;\
             ou=services,dc=example,dc=com
searchFilter=(&(objectClass=person)(uid=%s))
memberAttribute: isMemberOf
lookUpBindDn=cn=reader,dc=example,dc=com
ignoreSSLVerify=true
connectTimeout=2500

! Pool
pool.initsize=2
pool.maxsize=10
pool.authentication=simple

roleYamlPath=ROLES
watchRoleYaml=true
";

const ROLES: &str = "
roles:
  - name: admin
    permissions:
      - { entityType: NAMESPACE, permission: GET }
      - { entityType: NAMESPACE, permission: UPDATE }
mappings:
  - group: cn=admins,ou=groups,dc=example,dc=com
    roles: [admin]
";

fn write_fixture(dir: &TempDir) -> std::path::PathBuf {
    let roles = dir.path().join("roles.yaml");
    fs::write(&roles, ROLES).unwrap();
    let props = dir.path().join("ldap.properties");
    fs::write(
        &props,
        PROPERTIES.replace("ROLES", &roles.display().to_string()),
    )
    .unwrap();
    props
}

#[test]
fn test_load_property_file() {
    let dir = TempDir::new().unwrap();
    let props = write_fixture(&dir);

    let config = ConfigLoader::new()
        .with_file(&props)
        .unwrap()
        .with_secret_store(MapSecretStore::new().with_secret(LDAP_BIND_PASS, "from-store"))
        .load()
        .unwrap();

    let search = &config.search;
    assert_eq!(search.url(), "ldaps://dir.example.com:636");
    assert_eq!(
        search.base_dns(),
        ["ou=people,dc=example,dc=com", "ou=services,dc=example,dc=com"]
    );
    assert_eq!(search.filter_for("alice"), "(&(objectClass=person)(uid=alice))");
    assert_eq!(search.member_attribute(), "isMemberOf");
    assert_eq!(search.bind_dn(), Some("cn=reader,dc=example,dc=com"));
    assert_eq!(search.bind_password(), Some("from-store"));
    assert!(search.ignore_ssl_verify());
    assert_eq!(search.connect_timeout(), Duration::from_millis(2500));
    assert_eq!(search.pool().init_size, 2);
    assert_eq!(search.pool().max_size, 10);
    assert_eq!(search.pool().authentication, vec!["simple".to_string()]);

    assert!(config.watch_role_yaml);
    let roles = config.role_yaml_path.unwrap();
    let catalog = load_role_catalog(&roles).unwrap();
    assert_eq!(catalog.role_count(), 1);
    assert!(catalog.group("cn=admins,ou=groups,dc=example,dc=com").is_some());
}

#[test]
fn test_later_layers_win() {
    let dir = TempDir::new().unwrap();
    let props = write_fixture(&dir);

    let config = ConfigLoader::new()
        .with_file(&props)
        .unwrap()
        .with_string("pool.maxsize=20\n")
        .unwrap()
        .with_env_prefix("WARDEN")
        .with_env_vars([("WARDEN__POOL_MAXSIZE", "30")])
        .with_secret_store(MapSecretStore::new())
        .load()
        .unwrap();
    assert_eq!(config.search.pool().max_size, 30);
}

#[test]
fn test_optional_file() {
    let loader = ConfigLoader::new()
        .with_optional_file("/nonexistent/ldap.properties")
        .unwrap();
    assert!(loader.load_properties().is_empty());

    let err = ConfigLoader::new()
        .with_file("/nonexistent/ldap.properties")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn test_role_mapping_file_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roles.yaml");
    fs::write(&path, ROLES).unwrap();

    let file = RoleMappingFile::from_file(&path).unwrap();
    assert!(!file.is_empty());
    assert_eq!(file.roles[0].permissions.len(), 2);
}

#[test]
fn test_malformed_role_mapping() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roles.yaml");
    fs::write(&path, "roles: [ {name: admin, permissions: \n").unwrap();
    assert!(matches!(
        load_role_catalog(&path),
        Err(ConfigError::YamlError(_))
    ));
}
