//! Role dashboard handlers
//!
//! One handler serves every portal's dashboard; the role gate has already
//! verified the principal and set the active guard, so the handler only
//! reads the request extension and the role registry.

use crate::auth::middleware::{session_id_from, CurrentUser};
use crate::auth::{hierarchy_for, permission_matches, permissions_for, RoleName};
use crate::error::{ApiResult, AppError};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Optional action to test against the role's permission patterns
    pub can: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub user: DashboardUser,
    /// Permission patterns granted to this role
    pub permissions: Vec<&'static str>,
    /// Roles whose resources this role may view or manage
    pub manageable_roles: Vec<RoleName>,
    /// Answer to the `?can=` query, if one was asked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_perform: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DashboardUser {
    pub id: Uuid,
    pub name: String,
    pub role: RoleName,
    /// Seniority for display ordering only
    pub level: u8,
}

/// GET /{role}/dashboard (one route per role, behind the role gate)
pub async fn show(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<DashboardQuery>,
) -> Json<DashboardResponse> {
    let role = user.role;
    let can_perform = query.can.as_deref().map(|action| {
        permissions_for(role)
            .iter()
            .any(|pattern| permission_matches(pattern, action))
    });

    Json(DashboardResponse {
        success: true,
        user: DashboardUser {
            id: user.id,
            name: user.name,
            role,
            level: role.level(),
        },
        permissions: permissions_for(role).to_vec(),
        manageable_roles: hierarchy_for(role).to_vec(),
        can_perform,
    })
}

/// GET /reports
///
/// Operational reports are a staff surface shared by several roles, so it
/// uses the authority's role-set check instead of a single-role gate.
pub async fn reports(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> ApiResult<Json<serde_json::Value>> {
    const STAFF: [RoleName; 3] = [RoleName::Admin, RoleName::Organization, RoleName::Club];

    let cookie_name = &state.settings.session.cookie_name;
    let authorized = match session_id_from(&jar, cookie_name) {
        Some(sid) => state.authority.can_access(sid, "reports.view", &STAFF).await,
        None => false,
    };
    if !authorized {
        return Err(AppError::Unauthorized(
            "Sign in with a staff portal to view reports".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "reports": { "attendance": [], "payments": [], "certifications": [] },
    })))
}
