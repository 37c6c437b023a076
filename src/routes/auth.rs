//! Authentication route handlers
//!
//! Every role has its own login surface (`/{role}/login`); the handlers
//! here are thin and the session authority does the real work. Failed logins
//! redirect back with a role-agnostic error flashed on the email field, so
//! the response never reveals whether the email, the password, or the
//! portal was wrong.

use crate::auth::middleware::{session_cookie, session_id_from};
use crate::auth::{dashboard_route_for, default_role, label_for, resolve_dashboard, RoleName};
use crate::error::{ApiResult, AppError};
use crate::state::SharedState;
use crate::users::Principal;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// Wrong email, wrong password, and wrong portal all surface this same
/// message.
const CREDENTIALS_MESSAGE: &str = "These credentials do not match our records.";

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(min = 1, message = "A password is required."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginPageResponse {
    pub success: bool,
    pub role: RoleName,
    pub portal_label: &'static str,
    pub csrf_token: Uuid,
    /// Where a successful login on this portal lands
    pub dashboard_route: &'static str,
    /// Field-level errors flashed by a failed attempt, empty otherwise
    pub errors: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ViewContext {
    pub user: Option<ViewUser>,
}

#[derive(Debug, Serialize)]
pub struct ViewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: RoleName,
}

impl From<Principal> for ViewUser {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id,
            name: p.name,
            email: p.email,
            role: p.role,
        }
    }
}

/// A `{role}` path segment outside the registry is a missing portal, not a
/// data-integrity error.
fn parse_role_segment(segment: &str) -> Result<RoleName, AppError> {
    segment
        .parse()
        .map_err(|_| AppError::NotFound(format!("No such portal: {segment}")))
}

// ============================================
// Route Handlers
// ============================================

/// GET /{role}/login
///
/// Login-form context for one portal: the anti-forgery token and any
/// errors flashed by a previous attempt (consumed on read).
pub async fn show_login(
    State(state): State<SharedState>,
    Path(role): Path<String>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<LoginPageResponse>)> {
    let role = parse_role_segment(&role)?;
    let cookie_name = state.settings.session.cookie_name.clone();

    let record = match session_id_from(&jar, &cookie_name) {
        Some(sid) => state.sessions.get(sid).await,
        None => None,
    };
    let record = match record {
        Some(r) => r,
        None => state.sessions.create().await,
    };

    let errors = record.flash_errors.clone();
    if !errors.is_empty() {
        state
            .sessions
            .update(record.id, |s| s.flash_errors.clear())
            .await;
    }

    let jar = jar.add(session_cookie(&cookie_name, record.id));
    Ok((
        jar,
        Json(LoginPageResponse {
            success: true,
            role,
            portal_label: label_for(role),
            csrf_token: record.csrf_token,
            dashboard_route: dashboard_route_for(role),
            errors,
        }),
    ))
}

/// POST /{role}/login
///
/// Always starts from a clean slate: the previous session is swept and
/// invalidated before the attempt, so no stale authentication from another
/// role can leak into this one. Success redirects to the intended URL or
/// the role's dashboard; failure redirects back with a flashed error.
pub async fn login(
    State(state): State<SharedState>,
    Path(role): Path<String>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> ApiResult<(CookieJar, Redirect)> {
    let role = parse_role_segment(&role)?;
    let cookie_name = state.settings.session.cookie_name.clone();

    // The intended destination must survive the pre-login session wipe.
    let old_sid = session_id_from(&jar, &cookie_name);
    let intended = match old_sid {
        Some(sid) => state.sessions.get(sid).await.and_then(|r| r.intended_url),
        None => None,
    };

    let fresh = state.authority.clear_for_new_role(old_sid).await;
    let jar = jar.add(session_cookie(&cookie_name, fresh.id));

    if let Err(validation) = form.validate() {
        let errors = flatten_field_errors(&validation);
        state
            .sessions
            .update(fresh.id, |s| s.flash_errors = errors)
            .await;
        return Ok((jar, Redirect::to(&format!("/{role}/login"))));
    }

    let authenticated = state
        .authority
        .authenticate_with_role(fresh.id, &form.email, &form.password, role)
        .await?;

    if !authenticated {
        state
            .sessions
            .update(fresh.id, |s| {
                s.flash_errors
                    .insert("email".to_string(), CREDENTIALS_MESSAGE.to_string());
            })
            .await;
        return Ok((jar, Redirect::to(&format!("/{role}/login"))));
    }

    let destination = match intended {
        Some(url) => url,
        None => resolve_dashboard(Some(role))?.to_string(),
    };
    Ok((jar, Redirect::to(&destination)))
}

/// POST /{role}/logout
///
/// Full guard sweep and session invalidation, then back to the landing
/// page. Safe to call with nothing authenticated.
pub async fn logout(
    State(state): State<SharedState>,
    Path(role): Path<String>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    parse_role_segment(&role)?;
    let cookie_name = state.settings.session.cookie_name.clone();

    let fresh = state
        .authority
        .logout(session_id_from(&jar, &cookie_name))
        .await;
    let jar = jar.add(session_cookie(&cookie_name, fresh.id));
    Ok((jar, Redirect::to("/")))
}

/// GET /login
///
/// Generic landing: an already-authenticated principal is forwarded to
/// their dashboard, everyone else gets the portal list.
pub async fn generic_login(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> ApiResult<Response> {
    let cookie_name = &state.settings.session.cookie_name;
    if let Some(sid) = session_id_from(&jar, cookie_name) {
        if state.authority.current_user(sid).await.is_some() {
            let destination = state.authority.redirect_route(sid).await;
            return Ok(Redirect::to(destination).into_response());
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Select a portal to sign in.",
        "portals": RoleName::ALL,
        "default_portal": default_role(),
    }))
    .into_response())
}

/// GET /me
///
/// Shared view-context exposed to every rendered page.
pub async fn view_context(State(state): State<SharedState>, jar: CookieJar) -> Json<ViewContext> {
    let cookie_name = &state.settings.session.cookie_name;
    let user = match session_id_from(&jar, cookie_name) {
        Some(sid) => state.authority.current_user(sid).await,
        None => None,
    };

    Json(ViewContext {
        user: user.map(ViewUser::from),
    })
}

/// GET /
pub async fn home() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "MemberFlow API",
        "login": crate::auth::LOGIN_ROUTE,
    }))
}

fn flatten_field_errors(validation: &validator::ValidationErrors) -> HashMap<String, String> {
    validation
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let message = errors
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| "This value is invalid.".to_string());
            (field.to_string(), message)
        })
        .collect()
}
