//! Authentication and session-authority module
//!
//! Implements the multi-portal login model: every role has its own login
//! surface and its own session guard, and at most one guard may be
//! authenticated within a browser session at any stable point.

mod authority;
mod guard;
pub mod middleware;
mod password;
mod registry;
mod session;

pub use authority::AuthAuthority;
pub use guard::Guard;
pub use password::{hash_password, verify_password};
pub use registry::{
    dashboard_route_for, default_role, hierarchy_for, label_for, permission_matches,
    permissions_for, resolve_dashboard, LOGIN_ROUTE,
};
pub use session::{SessionId, SessionRecord, SessionStore};

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User roles for authorization
///
/// Closed set: every principal carries exactly one of these. Roles form a
/// DAG of can-view relationships (see `hierarchy_for`), not a linear order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    Admin,
    Organization,
    Club,
    Instructor,
    Student,
    Guardian,
}

impl RoleName {
    pub const ALL: [RoleName; 6] = [
        RoleName::Admin,
        RoleName::Organization,
        RoleName::Club,
        RoleName::Instructor,
        RoleName::Student,
        RoleName::Guardian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "admin",
            RoleName::Organization => "organization",
            RoleName::Club => "club",
            RoleName::Instructor => "instructor",
            RoleName::Student => "student",
            RoleName::Guardian => "guardian",
        }
    }

    /// Seniority level for display ordering only.
    ///
    /// Never feed this into an authorization decision; use `hierarchy_for`.
    pub fn level(&self) -> u8 {
        match self {
            RoleName::Admin => 1,
            RoleName::Organization => 2,
            RoleName::Club => 3,
            RoleName::Instructor => 4,
            RoleName::Student => 5,
            RoleName::Guardian => 5,
        }
    }

    /// The session guard dedicated to this role.
    pub fn guard(&self) -> Guard {
        registry::guard_for(*self)
    }
}

impl FromStr for RoleName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(RoleName::Admin),
            "organization" => Ok(RoleName::Organization),
            "club" => Ok(RoleName::Club),
            "instructor" => Ok(RoleName::Instructor),
            "student" => Ok(RoleName::Student),
            "guardian" => Ok(RoleName::Guardian),
            other => Err(AppError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn role_round_trips_through_str() {
        for role in RoleName::ALL {
            assert_eq!(role.as_str().parse::<RoleName>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_string_is_rejected() {
        let err = "superuser".parse::<RoleName>().unwrap_err();
        assert!(matches!(err, AppError::UnknownRole(ref v) if v == "superuser"));
    }
}
