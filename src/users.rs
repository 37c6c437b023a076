//! Principal management module
//!
//! Handles account storage and provisioning. Every account carries exactly
//! one role and a reference to its role-specific profile entity (the
//! profile itself lives with the business-entity collaborators, not here).

use crate::auth::{hash_password, RoleName};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Polymorphic reference to a role-specific profile entity
///
/// Exactly one profile entity owns a given principal; the profile's
/// lifecycle is independent of the account record, though both are
/// typically created together at provisioning time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRef {
    pub kind: RoleName,
    pub id: Uuid,
}

/// Account model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: RoleName,
    pub profile: ProfileRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Accounts plus the email lookup index, guarded together so the two
/// can never be locked in conflicting orders.
#[derive(Default)]
struct PrincipalTable {
    principals: HashMap<Uuid, Principal>,
    email_index: HashMap<String, Uuid>,
}

/// In-memory principal store
pub struct PrincipalStore {
    table: Arc<RwLock<PrincipalTable>>,
}

impl PrincipalStore {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(PrincipalTable::default())),
        }
    }

    /// Provision an account together with a fresh profile reference.
    pub async fn provision(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: RoleName,
    ) -> Result<Principal, AppError> {
        let now = Utc::now();
        let principal = Principal {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            name: name.to_string(),
            role,
            profile: ProfileRef {
                kind: role,
                id: Uuid::new_v4(),
            },
            created_at: now,
            updated_at: now,
        };
        self.create(principal).await
    }

    /// Insert a fully-formed account record.
    pub async fn create(&self, principal: Principal) -> Result<Principal, AppError> {
        let mut table = self.table.write().await;

        if table.email_index.contains_key(&principal.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        table.email_index.insert(principal.email.clone(), principal.id);
        table.principals.insert(principal.id, principal.clone());

        Ok(principal)
    }

    /// Find an account by email
    pub async fn find_by_email(&self, email: &str) -> Option<Principal> {
        let table = self.table.read().await;
        table
            .email_index
            .get(email)
            .and_then(|id| table.principals.get(id).cloned())
    }

    /// Find an account by ID
    pub async fn find_by_id(&self, id: Uuid) -> Option<Principal> {
        let table = self.table.read().await;
        table.principals.get(&id).cloned()
    }

    /// Seed one demo account per role (dev bootstrap only).
    ///
    /// Existing emails are left untouched, so reruns are harmless.
    pub async fn seed_demo_accounts(&self) -> Result<(), AppError> {
        for role in RoleName::ALL {
            let email = format!("{}@memberflow.local", role);
            if self.find_by_email(&email).await.is_some() {
                continue;
            }
            let name = format!("Demo {}", role);
            self.provision(&email, &name, "password123", role).await?;
        }
        Ok(())
    }
}

impl Default for PrincipalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn provision_creates_account_with_matching_profile_kind() {
        let store = PrincipalStore::new();
        let p = store
            .provision("coach@x.com", "Coach", "secret123", RoleName::Instructor)
            .await
            .unwrap();

        assert_eq!(p.role, RoleName::Instructor);
        assert_eq!(p.profile.kind, RoleName::Instructor);
        assert_eq!(store.find_by_email("coach@x.com").await.unwrap().id, p.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = PrincipalStore::new();
        store
            .provision("a@x.com", "A", "secret123", RoleName::Student)
            .await
            .unwrap();
        let err = store
            .provision("a@x.com", "A again", "secret123", RoleName::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    fn sample_principal(i: usize) -> Principal {
        let now = Utc::now();
        Principal {
            id: Uuid::new_v4(),
            email: format!("user{i}@x.com"),
            password_hash: "not-a-real-hash".to_string(),
            name: format!("User {i}"),
            role: RoleName::Student,
            profile: ProfileRef {
                kind: RoleName::Student,
                id: Uuid::new_v4(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_creates_and_lookups_do_not_block_each_other() {
        let store = Arc::new(PrincipalStore::new());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..1000 {
                    store.create(sample_principal(i)).await.unwrap();
                }
            })
        };
        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..1000 {
                    let _ = store.find_by_email("user0@x.com").await;
                }
            })
        };

        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            writer.await.unwrap();
            reader.await.unwrap();
        })
        .await
        .expect("store reads and writes should never block each other");
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = PrincipalStore::new();
        store.seed_demo_accounts().await.unwrap();
        store.seed_demo_accounts().await.unwrap();
        for role in RoleName::ALL {
            let email = format!("{}@memberflow.local", role);
            assert!(store.find_by_email(&email).await.is_some());
        }
    }
}
