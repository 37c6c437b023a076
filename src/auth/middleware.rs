//! Request gates for the multi-portal session model
//!
//! Two layers run in front of every protected route group: a
//! sweep that self-heals sessions where more than one guard is
//! authenticated, and the per-group role gate that promotes a verified
//! base-guard principal into the group's role guard.

use crate::auth::{Guard, RoleName, SessionId, LOGIN_ROUTE};
use crate::error::AppError;
use crate::state::SharedState;
use crate::users::Principal;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};

/// Authenticated principal inserted into request extensions by the role gate
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

/// Build the session cookie for a (possibly rotated) session id.
pub fn session_cookie(name: &str, id: SessionId) -> Cookie<'static> {
    Cookie::build((name.to_owned(), id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Read the session id out of the request's cookie jar.
pub fn session_id_from(jar: &CookieJar, cookie_name: &str) -> Option<SessionId> {
    jar.get(cookie_name).and_then(|c| c.value().parse().ok())
}

/// Conflict sweep (runs before any role gate)
///
/// Counts authenticated guards across the full guard set. More than one
/// logical session should never arise under normal use of the authority,
/// but residual cookies, racing requests, or tampering can get a session
/// there; the remedy is a forced full logout and a trip to the login page.
/// Consistent sessions pass through untouched.
pub async fn conflict_sweep(
    State(state): State<SharedState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    let cookie_name = state.settings.session.cookie_name.clone();
    if let Some(sid) = session_id_from(&jar, &cookie_name) {
        if let Some(record) = state.sessions.get(sid).await {
            if record.has_guard_conflict() {
                warn!(session = %sid, guards = ?record.authenticated_guards(),
                    "multiple guards authenticated in one session, forcing full logout");
                let fresh = state.authority.logout(Some(sid)).await;
                let jar = jar.add(session_cookie(&cookie_name, fresh.id));
                return (jar, Redirect::to(LOGIN_ROUTE)).into_response();
            }
        }
    }
    next.run(req).await
}

/// Role gate for one protected route group
///
/// No base principal: redirect to the generic login, remembering where the
/// user was heading. Wrong role: 403 naming required vs actual. Matching
/// role with a cold role guard: promote, then proceed. Warm: proceed. All
/// success paths set the active guard and expose [`CurrentUser`].
pub async fn role_guard(
    required: RoleName,
    State(state): State<SharedState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_name = state.settings.session.cookie_name.clone();
    let record = match session_id_from(&jar, &cookie_name) {
        Some(sid) => state.sessions.get(sid).await,
        None => None,
    };

    let mut resolved: Option<(SessionId, Principal)> = None;
    if let Some(r) = &record {
        if let Some(uid) = r.principal_on(Guard::Web) {
            if let Some(principal) = state.users.find_by_id(uid).await {
                resolved = Some((r.id, principal));
            }
        }
    }

    let Some((session_id, principal)) = resolved else {
        let intended = req.uri().to_string();
        let record = match record {
            Some(r) => r,
            None => state.sessions.create().await,
        };
        let record = state
            .sessions
            .update(record.id, |s| s.intended_url = Some(intended))
            .await
            .unwrap_or(record);
        let jar = jar.add(session_cookie(&cookie_name, record.id));
        return Ok((jar, Redirect::to(LOGIN_ROUTE)).into_response());
    };

    if principal.role != required {
        return Err(AppError::Forbidden {
            required,
            actual: principal.role,
        });
    }

    let guard = required.guard();
    let principal_id = principal.id;
    state
        .sessions
        .update(session_id, |s| {
            if !s.is_authenticated(guard) {
                debug!(session = %session_id, %guard, "promoting base principal into role guard");
                s.login(guard, principal_id);
            }
            s.active_guard = guard;
        })
        .await;

    req.extensions_mut().insert(CurrentUser(principal));
    Ok(next.run(req).await)
}
