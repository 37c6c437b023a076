//! Session guards
//!
//! A guard is an isolated authentication context: it independently tracks
//! "who (if anyone) is logged in" for one category of principal. There is a
//! role-agnostic base guard (`Web`) used for credential verification, plus
//! one dedicated guard per role.

use crate::auth::RoleName;
use serde::{Deserialize, Serialize};

/// Named authentication context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Guard {
    /// Role-agnostic base guard; first stop for every credential check
    Web,
    Admin,
    Organization,
    Club,
    Instructor,
    Student,
    Guardian,
}

impl Guard {
    /// The full guard set, base guard first.
    pub const ALL: [Guard; 7] = [
        Guard::Web,
        Guard::Admin,
        Guard::Organization,
        Guard::Club,
        Guard::Instructor,
        Guard::Student,
        Guard::Guardian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Guard::Web => "web",
            Guard::Admin => "admin",
            Guard::Organization => "organization",
            Guard::Club => "club",
            Guard::Instructor => "instructor",
            Guard::Student => "student",
            Guard::Guardian => "guardian",
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Guard::Web)
    }
}

impl From<RoleName> for Guard {
    fn from(role: RoleName) -> Self {
        match role {
            RoleName::Admin => Guard::Admin,
            RoleName::Organization => Guard::Organization,
            RoleName::Club => Guard::Club,
            RoleName::Instructor => Guard::Instructor,
            RoleName::Student => Guard::Student,
            RoleName::Guardian => Guard::Guardian,
        }
    }
}

impl std::fmt::Display for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_maps_to_its_own_guard() {
        for role in RoleName::ALL {
            let guard = Guard::from(role);
            assert!(!guard.is_base());
            assert_eq!(guard.as_str(), role.as_str());
        }
    }

    #[test]
    fn guard_set_covers_base_plus_all_roles() {
        assert_eq!(Guard::ALL.len(), RoleName::ALL.len() + 1);
        assert!(Guard::ALL.contains(&Guard::Web));
    }
}
