//! Entity identifiers.
//!
//! An entity is either known only locally (it was created while offline, or
//! its create call has not returned yet) or it has an id assigned by the
//! remote store. The two cases are distinct variants so that code resolving a
//! temporary id has to say so explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Display prefix for temporary ids. Only used for human-readable output.
pub const TEMP_PREFIX: &str = "temp_";

/// Identifier of a wardrobe entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityId {
    /// Locally generated placeholder, replaced once the remote create succeeds.
    Temporary(String),
    /// Identifier assigned by the remote store.
    Persisted(String),
}

impl EntityId {
    /// Generate a fresh temporary id.
    pub fn temporary() -> Self {
        EntityId::Temporary(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an id returned by the remote store.
    pub fn persisted(id: impl Into<String>) -> Self {
        EntityId::Persisted(id.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, EntityId::Temporary(_))
    }

    /// Returns the remote id, or `None` for a temporary id.
    pub fn remote(&self) -> Option<&str> {
        match self {
            EntityId::Persisted(id) => Some(id),
            EntityId::Temporary(_) => None,
        }
    }

    /// Parse a user-supplied id. Strings carrying the temp prefix map to
    /// temporary ids, everything else is treated as a remote id.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        match s.strip_prefix(TEMP_PREFIX) {
            Some(token) if !token.is_empty() => Some(EntityId::Temporary(token.to_string())),
            Some(_) => None,
            None => Some(EntityId::Persisted(s.to_string())),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Temporary(token) => write!(f, "{}{}", TEMP_PREFIX, token),
            EntityId::Persisted(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_ids_are_unique() {
        let a = EntityId::temporary();
        let b = EntityId::temporary();
        assert_ne!(a, b);
        assert!(a.is_temporary());
        assert!(a.remote().is_none());
    }

    #[test]
    fn test_persisted_remote() {
        let id = EntityId::persisted("abc123");
        assert!(!id.is_temporary());
        assert_eq!(id.remote(), Some("abc123"));
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn test_display_and_parse() {
        let id = EntityId::temporary();
        let shown = id.to_string();
        assert!(shown.starts_with(TEMP_PREFIX));
        assert_eq!(EntityId::parse(&shown), Some(id));

        assert_eq!(
            EntityId::parse(" 42 "),
            Some(EntityId::Persisted("42".to_string()))
        );
        assert_eq!(EntityId::parse(""), None);
        assert_eq!(EntityId::parse("temp_"), None);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let id = EntityId::Temporary("t1".to_string());
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!({ "temporary": "t1" }));

        let back: EntityId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
