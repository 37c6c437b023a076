//! Session authority
//!
//! The state machine at the heart of the multi-portal login model. A
//! principal is always verified against the base guard first, then promoted
//! into the guard dedicated to its role; every login and logout sweeps the
//! full guard set so no stale authentication can leak between portals.

use crate::auth::{registry, verify_password, Guard, RoleName, SessionId, SessionRecord, SessionStore};
use crate::error::AppError;
use crate::users::{Principal, PrincipalStore};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AuthAuthority {
    users: Arc<PrincipalStore>,
    sessions: Arc<SessionStore>,
}

impl AuthAuthority {
    pub fn new(users: Arc<PrincipalStore>, sessions: Arc<SessionStore>) -> Self {
        Self { users, sessions }
    }

    /// Authenticate credentials against the base guard for a claimed role.
    ///
    /// Returns `Ok(false)` for wrong email, wrong password, and wrong
    /// portal alike; the caller cannot distinguish them. A correct-password
    /// wrong-portal attempt reverts the base-guard login before returning,
    /// so no residual session state survives the failure.
    pub async fn authenticate_with_role(
        &self,
        session_id: SessionId,
        email: &str,
        password: &str,
        role: RoleName,
    ) -> Result<bool, AppError> {
        let Some(principal) = self.users.find_by_email(email).await else {
            return Ok(false);
        };
        if !verify_password(password, &principal.password_hash)? {
            return Ok(false);
        }

        // Base-guard login first; the role check runs against the stored role.
        let id = principal.id;
        if self
            .sessions
            .update(session_id, |s| s.login(Guard::Web, id))
            .await
            .is_none()
        {
            debug!(%session_id, "login attempt against missing session");
            return Ok(false);
        }

        if principal.role != role {
            // Wrong portal: revert the base login so nothing lingers.
            self.sessions
                .update(session_id, |s| s.logout(Guard::Web))
                .await;
            info!(email = %email, requested = %role, actual = %principal.role,
                "portal mismatch at login, base guard reverted");
            return Ok(false);
        }

        // Promotion: the role guard becomes authoritative for this session.
        let guard = role.guard();
        self.sessions
            .update(session_id, |s| {
                s.login(guard, id);
                s.active_guard = guard;
            })
            .await;
        info!(email = %email, %role, "login");
        Ok(true)
    }

    /// Sweep every guard and invalidate the session before a new login.
    ///
    /// Unconditional: runs the full sweep whether or not any guard believes
    /// it is authenticated. The returned replacement session carries a new
    /// id and anti-forgery token and the base guard as active.
    pub async fn clear_for_new_role(&self, session_id: Option<SessionId>) -> SessionRecord {
        self.sweep_and_invalidate(session_id).await
    }

    /// Explicit user logout; same sweep as `clear_for_new_role`.
    ///
    /// Idempotent: with nothing authenticated this still succeeds and still
    /// rotates the session token.
    pub async fn logout(&self, session_id: Option<SessionId>) -> SessionRecord {
        self.sweep_and_invalidate(session_id).await
    }

    async fn sweep_and_invalidate(&self, session_id: Option<SessionId>) -> SessionRecord {
        if let Some(id) = session_id {
            self.sessions
                .update(id, |s| {
                    for guard in Guard::ALL {
                        s.logout(guard);
                    }
                    s.active_guard = Guard::Web;
                })
                .await;
        }
        self.sessions.invalidate(session_id).await
    }

    /// The base guard's principal, promoted into its role guard.
    ///
    /// A session that is only base-guard-authenticated (long-lived cookie)
    /// is treated as fully role-authenticated here; the stored role is
    /// trusted without re-verifying credentials. That trust boundary is
    /// deliberate.
    pub async fn current_user(&self, session_id: SessionId) -> Option<Principal> {
        let principal = self.base_principal(session_id).await?;
        let guard = principal.role.guard();
        let id = principal.id;
        self.sessions
            .update(session_id, |s| {
                s.login(guard, id);
                s.active_guard = guard;
            })
            .await;
        Some(principal)
    }

    /// Dashboard destination for the session's principal, or the login page.
    pub async fn redirect_route(&self, session_id: SessionId) -> &'static str {
        match self.base_principal(session_id).await {
            Some(principal) => registry::dashboard_route_for(principal.role),
            None => registry::LOGIN_ROUTE,
        }
    }

    /// Whether the session's principal holds one of the allowed roles.
    ///
    /// `action` names what the caller is about to do; the decision rests
    /// on role membership alone, the action is recorded for the trace.
    pub async fn can_access(
        &self,
        session_id: SessionId,
        action: &str,
        allowed: &[RoleName],
    ) -> bool {
        match self.base_principal(session_id).await {
            Some(principal) => {
                let granted = allowed.contains(&principal.role);
                debug!(%action, role = %principal.role, granted, "access check");
                granted
            }
            None => false,
        }
    }

    async fn base_principal(&self, session_id: SessionId) -> Option<Principal> {
        let record = self.sessions.get(session_id).await?;
        let id = record.principal_on(Guard::Web)?;
        self.users.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> (AuthAuthority, Arc<SessionStore>, SessionRecord) {
        let users = Arc::new(PrincipalStore::new());
        users
            .provision("a@x.com", "Alice", "secret", RoleName::Admin)
            .await
            .unwrap();
        users
            .provision("c@x.com", "Casey", "secret", RoleName::Club)
            .await
            .unwrap();
        let sessions = Arc::new(SessionStore::new(3600));
        let record = sessions.create().await;
        let authority = AuthAuthority::new(users, sessions.clone());
        (authority, sessions, record)
    }

    fn assert_no_guard_authenticated(record: &SessionRecord) {
        for guard in Guard::ALL {
            assert!(!record.is_authenticated(guard), "{guard} still authenticated");
        }
    }

    #[tokio::test]
    async fn login_round_trip() {
        let (authority, sessions, session) = setup().await;

        let ok = authority
            .authenticate_with_role(session.id, "a@x.com", "secret", RoleName::Admin)
            .await
            .unwrap();
        assert!(ok);

        let user = authority.current_user(session.id).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(authority.redirect_route(session.id).await, "/admin/dashboard");

        let record = sessions.get(session.id).await.unwrap();
        assert_eq!(record.active_guard, Guard::Admin);
        assert!(!record.has_guard_conflict());
    }

    #[tokio::test]
    async fn wrong_portal_leaves_no_residual_state() {
        let (authority, sessions, session) = setup().await;

        let ok = authority
            .authenticate_with_role(session.id, "a@x.com", "secret", RoleName::Student)
            .await
            .unwrap();
        assert!(!ok);

        let record = sessions.get(session.id).await.unwrap();
        assert_no_guard_authenticated(&record);
        assert!(authority.current_user(session.id).await.is_none());
    }

    #[tokio::test]
    async fn wrong_password_does_not_touch_the_session() {
        let (authority, sessions, session) = setup().await;

        let before = sessions.get(session.id).await.unwrap();
        let ok = authority
            .authenticate_with_role(session.id, "a@x.com", "nope", RoleName::Admin)
            .await
            .unwrap();
        assert!(!ok);

        let after = sessions.get(session.id).await.unwrap();
        assert_eq!(after.id, before.id);
        assert_no_guard_authenticated(&after);
    }

    #[tokio::test]
    async fn unknown_email_is_indistinguishable_from_wrong_password() {
        let (authority, _, session) = setup().await;
        let ok = authority
            .authenticate_with_role(session.id, "nobody@x.com", "secret", RoleName::Admin)
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn clear_for_new_role_empties_every_guard() {
        let (authority, sessions, session) = setup().await;
        authority
            .authenticate_with_role(session.id, "a@x.com", "secret", RoleName::Admin)
            .await
            .unwrap();

        let fresh = authority.clear_for_new_role(Some(session.id)).await;

        assert_ne!(fresh.id, session.id);
        assert_no_guard_authenticated(&fresh);
        assert_eq!(fresh.active_guard, Guard::Web);
        assert!(sessions.get(session.id).await.is_none());
    }

    #[tokio::test]
    async fn logout_twice_matches_logout_once() {
        let (authority, _, session) = setup().await;
        authority
            .authenticate_with_role(session.id, "c@x.com", "secret", RoleName::Club)
            .await
            .unwrap();

        let once = authority.logout(Some(session.id)).await;
        let twice = authority.logout(Some(once.id)).await;

        assert_no_guard_authenticated(&once);
        assert_no_guard_authenticated(&twice);
        // token still rotates on the no-op logout
        assert_ne!(once.csrf_token, twice.csrf_token);
    }

    #[tokio::test]
    async fn second_request_reuses_the_session_without_credentials() {
        let (authority, _, session) = setup().await;
        authority
            .authenticate_with_role(session.id, "c@x.com", "secret", RoleName::Club)
            .await
            .unwrap();

        // Fresh authority over the same stores simulates the next request.
        let (users, sessions) = (authority.users.clone(), authority.sessions.clone());
        let next_request = AuthAuthority::new(users, sessions);
        let user = next_request.current_user(session.id).await.unwrap();
        assert_eq!(user.role, RoleName::Club);
    }

    #[tokio::test]
    async fn can_access_is_false_when_unauthenticated() {
        let (authority, _, session) = setup().await;
        let allowed = [RoleName::Admin, RoleName::Organization];
        assert!(!authority.can_access(session.id, "reports.view", &allowed).await);
    }

    #[tokio::test]
    async fn can_access_checks_role_membership() {
        let (authority, _, session) = setup().await;
        authority
            .authenticate_with_role(session.id, "c@x.com", "secret", RoleName::Club)
            .await
            .unwrap();

        assert!(authority.can_access(session.id, "reports.view", &[RoleName::Club]).await);
        assert!(!authority.can_access(session.id, "reports.view", &[RoleName::Admin]).await);
        // The action label never changes the decision, only the roles do
        assert!(authority.can_access(session.id, "anything.else", &[RoleName::Club]).await);
    }

    #[tokio::test]
    async fn redirect_route_falls_back_to_login() {
        let (authority, _, session) = setup().await;
        assert_eq!(authority.redirect_route(session.id).await, "/login");
    }
}
