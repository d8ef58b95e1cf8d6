//! # Warden
//!
//! **Directory-backed role authorization for namespaced entities**
//!
//! Warden decides whether a principal may perform an operation on an entity.
//! A principal's groups come from an LDAP directory, groups map to roles,
//! and roles grant permissions per entity type. A grant on a namespace
//! extends to the ordinary entities inside it, but never out of the system
//! namespace and never onto secure keys or profiles.
//!
//! ## Quick Start
//!
//! ```no_run
//! use warden::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warden = Warden::builder()
//!         .with_properties_file("/etc/warden/ldap.properties")?
//!         .with_telemetry(true)
//!         .start()
//!         .await?;
//!
//!     let alice = Principal::new("alice");
//!     let jar = EntityId::artifact("analytics", "etl-1.0.0.jar");
//!     let decision = warden.authorizer().authorize(&alice, &jar, Permission::Get).await;
//!     println!("{decision}");
//!
//!     warden.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ldap.properties ─► ConfigLoader ─► WardenConfig
//!                                        │
//!        roles.yaml ─► RoleGroupCatalog ─┼─► Authorizer ◄── authorize()
//!            ▲                           │       │
//!            └── FileWatcher (reload)    └─► GroupResolver ─► directory
//! ```
//!
//! The member crates can be used on their own:
//! - [`core`]: entity identifiers, permissions and principals
//! - [`directory`]: pooled group resolution with bounded retries
//! - [`authz`]: the role catalog, propagation rules and the authorizer
//! - [`config`]: property files, secrets and the role mapping format
//! - [`telemetry`]: logging and metrics setup

#![doc(html_root_url = "https://docs.rs/warden/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;
mod error;
pub mod reload;

pub use warden_authz as authz;
pub use warden_config as config;
pub use warden_core as core;
pub use warden_directory as directory;
pub use warden_telemetry as telemetry;

pub use bootstrap::{Warden, WardenBuilder};
pub use error::{WardenError, WardenResult};
pub use reload::{reload_from_file, ReloadHandle};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use warden::prelude::*;
///
/// let entity = EntityId::namespace_entity("analytics");
/// assert!(entity.is_namespace());
/// ```
pub mod prelude {
    pub use crate::{Warden, WardenBuilder, WardenError, WardenResult};
    pub use warden_authz::{Authorizer, AuthorizerSettings, Decision, FullAccessPolicy};
    pub use warden_core::{EntityId, EntityType, Permission, Principal};
}
