//! Role registry
//!
//! Static, process-wide configuration for the closed role set: display
//! metadata, permission patterns, dashboard destination, the set of roles
//! each role may view or manage, and the dedicated session guard.
//! Loaded once at startup; read-only afterwards.

use crate::auth::{Guard, RoleName};
use crate::error::AppError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::error;

/// Generic landing page shown when no role-specific portal applies.
pub const LOGIN_ROUTE: &str = "/login";

/// Per-role static configuration
#[derive(Debug)]
pub struct RoleMeta {
    pub label: &'static str,
    /// Permission patterns; `"*"` is unrestricted, `"student.*"` is a prefix wildcard
    pub permissions: &'static [&'static str],
    pub dashboard_route: &'static str,
    /// Roles whose resources this role may view/manage; always includes itself
    pub hierarchy: &'static [RoleName],
    pub guard: Guard,
}

static REGISTRY: Lazy<HashMap<RoleName, RoleMeta>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        RoleName::Admin,
        RoleMeta {
            label: "Administrator",
            permissions: &["*"],
            dashboard_route: "/admin/dashboard",
            hierarchy: &RoleName::ALL,
            guard: Guard::Admin,
        },
    );
    m.insert(
        RoleName::Organization,
        RoleMeta {
            label: "Organization",
            permissions: &["organization.*", "club.*", "instructor.*", "student.*", "guardian.view"],
            dashboard_route: "/organization/dashboard",
            hierarchy: &[
                RoleName::Organization,
                RoleName::Club,
                RoleName::Instructor,
                RoleName::Student,
                RoleName::Guardian,
            ],
            guard: Guard::Organization,
        },
    );
    m.insert(
        RoleName::Club,
        RoleMeta {
            label: "Club",
            permissions: &["club.*", "instructor.*", "student.*", "guardian.view"],
            dashboard_route: "/club/dashboard",
            hierarchy: &[
                RoleName::Club,
                RoleName::Instructor,
                RoleName::Student,
                RoleName::Guardian,
            ],
            guard: Guard::Club,
        },
    );
    m.insert(
        RoleName::Instructor,
        RoleMeta {
            label: "Instructor",
            permissions: &["instructor.profile", "student.*", "attendance.*", "rating.*"],
            dashboard_route: "/instructor/dashboard",
            hierarchy: &[RoleName::Instructor, RoleName::Student],
            guard: Guard::Instructor,
        },
    );
    m.insert(
        RoleName::Student,
        RoleMeta {
            label: "Student",
            permissions: &["student.profile", "student.attendance", "student.payments"],
            dashboard_route: "/student/dashboard",
            hierarchy: &[RoleName::Student],
            guard: Guard::Student,
        },
    );
    m.insert(
        RoleName::Guardian,
        RoleMeta {
            label: "Guardian",
            permissions: &["guardian.profile", "student.view", "student.payments"],
            dashboard_route: "/guardian/dashboard",
            hierarchy: &[RoleName::Guardian, RoleName::Student],
            guard: Guard::Guardian,
        },
    );
    m
});

fn meta(role: RoleName) -> &'static RoleMeta {
    // The registry covers the closed set; a miss is a startup configuration bug.
    REGISTRY
        .get(&role)
        .unwrap_or_else(|| panic!("role registry missing entry for {role}"))
}

/// Display label for a role's portal.
pub fn label_for(role: RoleName) -> &'static str {
    meta(role).label
}

/// Permission patterns granted to a role.
pub fn permissions_for(role: RoleName) -> &'static [&'static str] {
    meta(role).permissions
}

/// Dashboard destination for a role's portal.
pub fn dashboard_route_for(role: RoleName) -> &'static str {
    meta(role).dashboard_route
}

/// Roles whose resources this role may view or manage (always includes itself).
pub fn hierarchy_for(role: RoleName) -> &'static [RoleName] {
    meta(role).hierarchy
}

/// The session guard dedicated to a role. Every role maps to its own
/// guard; only the implicit base guard falls outside the registry.
pub fn guard_for(role: RoleName) -> Guard {
    meta(role).guard
}

/// Role assigned when provisioning does not specify one.
pub fn default_role() -> RoleName {
    RoleName::Student
}

/// Post-login destination for a principal's role.
///
/// Total over the closed set with an explicit none branch: a principal
/// without a registered role is a data-integrity problem and fails loudly
/// rather than silently defaulting somewhere.
pub fn resolve_dashboard(role: Option<RoleName>) -> Result<&'static str, AppError> {
    match role {
        Some(r) => Ok(dashboard_route_for(r)),
        None => {
            error!("dashboard redirect requested for a principal with no registered role");
            Err(AppError::UnknownRole("<none>".to_string()))
        }
    }
}

/// Match an action against a permission pattern.
///
/// `"*"` matches everything; `"prefix.*"` matches any action under the
/// prefix (including the bare prefix itself); anything else is an exact match.
pub fn permission_matches(pattern: &str, action: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix(".*") {
        Some(prefix) => {
            action == prefix
                || action
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
        }
        None => pattern == action,
    }
}
