//! Caller roles and permission checks.
//!
//! Authentication happens outside Stratus; callers arrive with an
//! already-established [`AccessRole`].

use crate::{StratusError, StratusResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller roles with hierarchical permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    /// May read weather data.
    #[default]
    Reader,
    /// May also purge and inspect caches.
    Admin,
}

impl AccessRole {
    /// Returns the role's permission level (higher = more permissions).
    #[must_use]
    pub const fn level(&self) -> u8 {
        match self {
            Self::Reader => 1,
            Self::Admin => 2,
        }
    }

    /// Checks if this role has at least the permissions of the required role.
    #[must_use]
    pub const fn has_permission(&self, required: Self) -> bool {
        self.level() >= required.level()
    }

    /// Returns all available roles.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Reader, Self::Admin]
    }
}

impl FromStr for AccessRole {
    type Err = StratusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reader" | "user" => Ok(Self::Reader),
            "admin" | "administrator" => Ok(Self::Admin),
            other => Err(StratusError::validation(format!("Unknown role: {other}"))),
        }
    }
}

impl fmt::Display for AccessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Operations guarded by a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    WeatherRead,
    CachePurge,
    CacheInspect,
    CircuitInspect,
}

impl Permission {
    /// Returns the minimum role required for this permission.
    #[must_use]
    pub const fn minimum_role(&self) -> AccessRole {
        match self {
            Self::WeatherRead => AccessRole::Reader,
            Self::CachePurge | Self::CacheInspect | Self::CircuitInspect => AccessRole::Admin,
        }
    }

    /// Checks if a role has this permission.
    #[must_use]
    pub const fn is_allowed_for(&self, role: AccessRole) -> bool {
        role.has_permission(self.minimum_role())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WeatherRead => "weather:read",
            Self::CachePurge => "cache:purge",
            Self::CacheInspect => "cache:inspect",
            Self::CircuitInspect => "circuit:inspect",
        };
        write!(f, "{s}")
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Caller identity, used only for logging.
    pub subject: String,
    /// Established role.
    pub role: AccessRole,
}

impl Caller {
    /// Creates a caller with the given identity and role.
    #[must_use]
    pub fn new(subject: impl Into<String>, role: AccessRole) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    /// Creates a reader caller.
    #[must_use]
    pub fn reader(subject: impl Into<String>) -> Self {
        Self::new(subject, AccessRole::Reader)
    }

    /// Creates an admin caller.
    #[must_use]
    pub fn admin(subject: impl Into<String>) -> Self {
        Self::new(subject, AccessRole::Admin)
    }

    /// Requires a specific role.
    pub fn require_role(&self, role: AccessRole) -> StratusResult<()> {
        if self.role.has_permission(role) {
            Ok(())
        } else {
            Err(StratusError::Forbidden(format!(
                "Required role: {}, your role: {}",
                role, self.role
            )))
        }
    }

    /// Requires a specific permission.
    pub fn require_permission(&self, permission: Permission) -> StratusResult<()> {
        if permission.is_allowed_for(self.role) {
            Ok(())
        } else {
            Err(StratusError::Forbidden(format!(
                "Permission denied: {} requires at least {} role",
                permission,
                permission.minimum_role()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(AccessRole::Admin.has_permission(AccessRole::Reader));
        assert!(AccessRole::Admin.has_permission(AccessRole::Admin));
        assert!(!AccessRole::Reader.has_permission(AccessRole::Admin));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<AccessRole>().unwrap(), AccessRole::Admin);
        assert_eq!("user".parse::<AccessRole>().unwrap(), AccessRole::Reader);
        assert!("guest".parse::<AccessRole>().is_err());
    }

    #[test]
    fn test_permissions() {
        assert!(Permission::WeatherRead.is_allowed_for(AccessRole::Reader));
        assert!(!Permission::CachePurge.is_allowed_for(AccessRole::Reader));
        assert!(Permission::CircuitInspect.is_allowed_for(AccessRole::Admin));
    }

    #[test]
    fn test_reader_denied_purge() {
        let caller = Caller::reader("alice");
        let err = caller.require_permission(Permission::CachePurge).unwrap_err();
        assert!(matches!(err, StratusError::Forbidden(_)));
        assert!(err.to_string().contains("cache:purge"));

        assert!(Caller::admin("root").require_permission(Permission::CachePurge).is_ok());
        assert!(caller.require_role(AccessRole::Reader).is_ok());
    }
}
