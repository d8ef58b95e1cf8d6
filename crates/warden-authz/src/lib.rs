//! # Warden Authorization
//!
//! Maps directory groups to roles, roles to permissions, and decides whether
//! a principal holds a permission on an entity.
//!
//! # Overview
//!
//! - [`RoleGroupCatalog`] - Validated roles and group mappings
//! - [`SharedCatalog`] - The current catalog, swappable at runtime
//! - [`PermissionEngine`] - Direct grants plus namespace propagation
//! - [`PermissionCache`] - Per-principal permissions keyed by catalog generation
//! - [`Authorizer`] - The fail-closed facade callers use
//!
//! # Architecture
//!
//! ```text
//!   (principal, entity, permission)
//!              │
//!   ┌──────────▼──────────┐   full access?  ──► Allow
//!   │     Authorizer      │
//!   └──────────┬──────────┘
//!              │ cache miss
//!   ┌──────────▼──────────┐      ┌──────────────────┐
//!   │  PermissionEngine   │─────►│   GroupSource    │  (directory)
//!   └──────────┬──────────┘      └──────────────────┘
//!              │ groups
//!   ┌──────────▼──────────┐
//!   │  RoleGroupCatalog   │  snapshot
//!   └──────────┬──────────┘
//!              ▼
//!     direct ∪ propagated  ──► Decision
//! ```
//!
//! # Propagation
//!
//! A grant on the `Namespace` type in namespace `ns` also grants that
//! permission on entities owned by `ns`, except:
//!
//! - entities in the `system` namespace (including every entity without one),
//! - secure keys and profiles,
//! - grants marked `namespace_only`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::{
//!     Authorizer, AuthorizerSettings, EntityTypeWithPermission, GroupWithRoles, Role,
//!     RoleGroupCatalog, SharedCatalog,
//! };
//! use warden_core::{EntityId, EntityType, Permission, Principal};
//! use warden_directory::StaticGroupSource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = RoleGroupCatalog::new(
//!     [Role::new("admin", [EntityTypeWithPermission::new(EntityType::Namespace, Permission::Get)])],
//!     [GroupWithRoles::new("admins", ["admin"])],
//! )?;
//! let groups = StaticGroupSource::new().with_groups("admin", ["admins"]);
//! let authorizer = Authorizer::new(
//!     Arc::new(groups),
//!     SharedCatalog::new(catalog),
//!     AuthorizerSettings::default(),
//! );
//!
//! let decision = authorizer
//!     .authorize(&Principal::new("admin"), &EntityId::artifact("test", "test-1.0.jar"), Permission::Get)
//!     .await;
//! assert!(decision.is_allowed());
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/warden-authz/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorizer;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod principal;
pub mod role;

// Re-exports for convenience
pub use authorizer::{Authorizer, Decision, FullAccessList, FullAccessPolicy, NoFullAccess};
pub use cache::{CacheConfig, CacheStats, PermissionCache};
pub use catalog::{CatalogSnapshot, RoleGroupCatalog, SharedCatalog};
pub use config::AuthorizerSettings;
pub use engine::{direct_permissions, propagated_permissions, propagates_to, PermissionEngine};
pub use error::{AuthzError, AuthzResult};
pub use principal::PrincipalPermissions;
pub use role::{EntityTypeWithPermission, GroupWithRoles, NamespaceScope, Role, ALL_NAMESPACES};
