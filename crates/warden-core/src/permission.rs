//! Permission model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A grantable permission.
///
/// Names are upper snake case on the wire (`GET`, `SET_OWNER`). `READ` is
/// accepted as an alias of [`Permission::Get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Read an entity.
    #[serde(alias = "READ")]
    Get,
    /// Modify an entity.
    Update,
    /// Delete an entity.
    Delete,
    /// List child entities.
    List,
    /// Create child entities.
    Create,
    /// Use an entity from another entity (e.g. a profile from a program run).
    Use,
    /// Run a program.
    Execute,
    /// Change the owner of an entity.
    SetOwner,
    /// Act as the entity's owner.
    Impersonate,
    /// Read grants and ownership details.
    ReadSecurityDetails,
    /// Modify grants.
    UpdateSecurityDetails,
    /// Probe instance health.
    HealthCheck,
}

impl Permission {
    /// All permissions, in declaration order.
    pub const ALL: [Permission; 12] = [
        Self::Get,
        Self::Update,
        Self::Delete,
        Self::List,
        Self::Create,
        Self::Use,
        Self::Execute,
        Self::SetOwner,
        Self::Impersonate,
        Self::ReadSecurityDetails,
        Self::UpdateSecurityDetails,
        Self::HealthCheck,
    ];

    /// Canonical upper snake case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::List => "LIST",
            Self::Create => "CREATE",
            Self::Use => "USE",
            Self::Execute => "EXECUTE",
            Self::SetOwner => "SET_OWNER",
            Self::Impersonate => "IMPERSONATE",
            Self::ReadSecurityDetails => "READ_SECURITY_DETAILS",
            Self::UpdateSecurityDetails => "UPDATE_SECURITY_DETAILS",
            Self::HealthCheck => "HEALTH_CHECK",
        }
    }

    /// Parse a permission name, accepting the `READ` alias.
    pub fn parse(name: &str) -> CoreResult<Self> {
        name.parse()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("READ") {
            return Ok(Self::Get);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::unknown_permission(wanted))
    }
}
