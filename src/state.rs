//! Application state management
//!
//! Contains shared state accessible across all handlers: the principal
//! store, the session store, and the session authority wired over both.

use crate::auth::{AuthAuthority, SessionStore};
use crate::config::Settings;
use crate::users::PrincipalStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Account store (credential source for every guard)
    pub users: Arc<PrincipalStore>,

    /// Session store (one record per browser session)
    pub sessions: Arc<SessionStore>,

    /// Core login/logout/guard-switch state machine
    pub authority: AuthAuthority,

    /// Loaded configuration
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let users = Arc::new(PrincipalStore::new());
        let sessions = Arc::new(SessionStore::new(settings.session.ttl_secs));
        let authority = AuthAuthority::new(users.clone(), sessions.clone());

        Self {
            users,
            sessions,
            authority,
            settings,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
