//! # Warden Core
//!
//! Core types shared by the Warden authorization crates.
//!
//! This crate provides the vocabulary every other crate speaks:
//!
//! - [`EntityType`] - Closed set of authorizable entity categories
//! - [`EntityId`] - A concrete entity, optionally owned by a namespace
//! - [`Permission`] - Closed set of grantable permissions
//! - [`Principal`] - The identity being authorized
//! - [`CoreError`] - Parse and construction errors for the above

#![doc(html_root_url = "https://docs.rs/warden-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod entity;
mod error;
mod permission;
mod principal;

pub use entity::{EntityId, EntityType, SYSTEM_NAMESPACE};
pub use error::{CoreError, CoreResult};
pub use permission::Permission;
pub use principal::Principal;
