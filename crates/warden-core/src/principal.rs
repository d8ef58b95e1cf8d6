//! The identity being authorized.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A principal, identified by its directory username.
///
/// The name is opaque: it is never parsed, trimmed or case folded, because
/// the directory decides what is significant.
///
/// # Example
///
/// ```rust
/// use warden_core::Principal;
///
/// let alice = Principal::new("alice");
/// assert_eq!(alice.name(), "alice");
/// assert_eq!(alice.to_string(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create a principal from its directory name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The directory name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Principal {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_preserved() {
        let p = Principal::new(" Alice ");
        assert_eq!(p.name(), " Alice ");
        assert_ne!(p, Principal::new("alice"));
    }

    #[test]
    fn test_serde_transparent() {
        let p: Principal = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(p, Principal::from("bob"));
    }
}
