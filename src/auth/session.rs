//! Session store
//!
//! Process-backed session state keyed by an opaque session identifier. Each
//! record holds one slot per guard, an anti-forgery token, and flash data
//! for the redirect-back login flow. Invalidation always issues a fresh
//! identifier and token, so a fixated session id never survives a login
//! or logout.

use crate::auth::Guard;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque session identifier carried in the session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

/// One browser session's server-side state
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    /// Anti-forgery token; regenerated whenever the session is invalidated
    pub csrf_token: Uuid,
    /// Authenticated principal per guard; absent key = guard logged out
    slots: HashMap<Guard, Uuid>,
    /// Which guard authorization checks resolve against for this session
    pub active_guard: Guard,
    /// Field-level errors flashed across a redirect (consumed on read)
    pub flash_errors: HashMap<String, String>,
    /// URL the user was heading to when redirected to login
    pub intended_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    fn new() -> Self {
        Self {
            id: SessionId::generate(),
            csrf_token: Uuid::new_v4(),
            slots: HashMap::new(),
            active_guard: Guard::Web,
            flash_errors: HashMap::new(),
            intended_url: None,
            created_at: Utc::now(),
        }
    }

    /// Mark a guard as authenticated for a principal.
    pub fn login(&mut self, guard: Guard, principal_id: Uuid) {
        self.slots.insert(guard, principal_id);
    }

    /// Clear a single guard's authentication.
    pub fn logout(&mut self, guard: Guard) {
        self.slots.remove(&guard);
    }

    pub fn is_authenticated(&self, guard: Guard) -> bool {
        self.slots.contains_key(&guard)
    }

    pub fn principal_on(&self, guard: Guard) -> Option<Uuid> {
        self.slots.get(&guard).copied()
    }

    /// Guards currently authenticated, with their principal ids.
    pub fn authenticated_guards(&self) -> Vec<(Guard, Uuid)> {
        Guard::ALL
            .iter()
            .filter_map(|g| self.slots.get(g).map(|id| (*g, *id)))
            .collect()
    }

    /// Detect the more-than-one-logical-session state.
    ///
    /// The base guard plus the role guard holding the *same* principal is
    /// one logical session (that is the normal post-login shape). Two role
    /// guards, or the base guard disagreeing with a role guard about who is
    /// logged in, is a conflict.
    pub fn has_guard_conflict(&self) -> bool {
        let base = self.principal_on(Guard::Web);
        let role_slots: Vec<Uuid> = Guard::ALL
            .iter()
            .filter(|g| !g.is_base())
            .filter_map(|g| self.slots.get(g).copied())
            .collect();

        match role_slots.as_slice() {
            [] => false,
            [single] => base.is_some_and(|b| b != *single),
            _ => true,
        }
    }
}

/// In-memory session store
///
/// A single write lock per mutation gives the request-atomic
/// read-modify-write the design relies on; concurrent requests from the
/// same browser session racing here is an accepted rarity the conflict
/// sweep self-heals.
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Create a fresh, unauthenticated session.
    pub async fn create(&self) -> SessionRecord {
        let record = SessionRecord::new();
        self.sessions.write().await.insert(record.id, record.clone());
        record
    }

    /// Look up a live session; expired records are pruned on access.
    pub async fn get(&self, id: SessionId) -> Option<SessionRecord> {
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some(record) if record.created_at + self.ttl > Utc::now() => {
                    return Some(record.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.sessions.write().await.remove(&id);
        }
        None
    }

    /// Mutate a session in place under the write lock.
    ///
    /// Returns the record after mutation, or `None` if the session does
    /// not exist (expired or never created).
    pub async fn update<F>(&self, id: SessionId, f: F) -> Option<SessionRecord>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(&id)?;
        f(record);
        Some(record.clone())
    }

    /// Destroy a session and issue a replacement.
    ///
    /// The replacement carries a new id and a new anti-forgery token and
    /// no authenticated guards. Passing an unknown or absent id still
    /// yields a fresh session (logout is idempotent).
    pub async fn invalidate(&self, id: Option<SessionId>) -> SessionRecord {
        let mut sessions = self.sessions.write().await;
        if let Some(id) = id {
            sessions.remove(&id);
        }
        let record = SessionRecord::new();
        sessions.insert(record.id, record.clone());
        record
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
