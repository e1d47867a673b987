//! Operator roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three-level role lattice.
///
/// There is no hierarchy machinery: endpoints check concrete
/// capability predicates, not rank comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control, including agent deletion and vault configuration.
    Admin,
    /// Day-to-day operation: agent CRUD, audit reads, usage reads.
    Operator,
    /// Read-only dispatch and status access.
    Viewer,
}

impl Role {
    /// May create and update agents.
    #[must_use]
    pub fn can_manage_agents(&self) -> bool {
        matches!(self, Self::Admin | Self::Operator)
    }

    /// May delete agents.
    #[must_use]
    pub fn can_delete_agents(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// May read the audit log and usage snapshots.
    #[must_use]
    pub fn can_read_audit(&self) -> bool {
        matches!(self, Self::Admin | Self::Operator)
    }

    /// May read and write the vault configuration.
    #[must_use]
    pub fn can_manage_vault(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The wire name (`admin`, `operator`, `viewer`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "operator" => Ok(Self::Operator),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(Role::Admin.can_delete_agents());
        assert!(!Role::Operator.can_delete_agents());
        assert!(Role::Operator.can_manage_agents());
        assert!(!Role::Viewer.can_manage_agents());
        assert!(!Role::Viewer.can_read_audit());
        assert!(!Role::Operator.can_manage_vault());
    }

    #[test]
    fn test_wire_round_trip() {
        for role in [Role::Admin, Role::Operator, Role::Viewer] {
            let parsed: Role = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);

            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!("superuser".parse::<Role>().is_err());
    }
}
