//! In-memory repository implementations. Used by the integration test
//! suite and as a development fallback when no relational store is
//! configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use ulh_core::{ApiTokenRecord, App, PermissionRow, Tier, User};

use crate::traits::{
    AppRepository, BalanceLedger, ProfileRepository, RepositoryError, SecretStore,
    TransferOutcome, UserProfile, UserRepository,
};
use crate::{ApiTokenRepository, PermissionRepository};

/// An in-memory relational-store stand-in. Cheap to clone (internals are
/// `Arc`-wrapped); share one instance across a test's repositories.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    apps_by_id: Arc<DashMap<String, App>>,
    users: Arc<DashMap<String, (User, AtomicBalance)>>,
    tokens: Arc<DashMap<String, ApiTokenRecord>>,
    permissions: Arc<DashMap<(String, String), Vec<PermissionRow>>>,
    objects: Arc<DashMap<String, BTreeMap<String, String>>>,
    secrets: Arc<DashMap<(String, String), BTreeMap<String, String>>>,
    profiles: Arc<DashMap<String, UserProfile>>,
}

struct AtomicBalance(AtomicI64);

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_app(&self, app: App) {
        self.apps_by_id.insert(app.id.clone(), app);
    }

    pub fn put_user(&self, user: User) {
        let balance = AtomicBalance(AtomicI64::new(user.balance_cents));
        self.users.insert(user.id.clone(), (user, balance));
    }

    pub fn put_token(&self, token: ApiTokenRecord) {
        self.tokens.insert(token.token_hash.clone(), token);
    }

    pub fn put_permissions(&self, user_id: &str, app_id: &str, rows: Vec<PermissionRow>) {
        self.permissions
            .insert((user_id.to_string(), app_id.to_string()), rows);
    }

    /// Register the object store contents for `storage_key`: a map of
    /// filename to source text (spec §4.6's four candidate entry names).
    pub fn put_object(&self, storage_key: &str, files: BTreeMap<String, String>) {
        self.objects.insert(storage_key.to_string(), files);
    }

    pub fn put_secrets(&self, user_id: &str, app_id: &str, secrets: BTreeMap<String, String>) {
        self.secrets
            .insert((user_id.to_string(), app_id.to_string()), secrets);
    }

    pub fn put_profile(&self, user_id: &str, profile: UserProfile) {
        self.profiles.insert(user_id.to_string(), profile);
    }

    pub fn balance_of(&self, user_id: &str) -> Option<i64> {
        self.users.get(user_id).map(|e| e.1.0.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl AppRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<App>, RepositoryError> {
        Ok(self.apps_by_id.get(id).map(|e| e.value().clone()))
    }

    async fn find_by_slug(&self, owner_id: &str, slug: &str) -> Result<Option<App>, RepositoryError> {
        Ok(self
            .apps_by_id
            .iter()
            .map(|e| e.value().clone())
            .find(|a| a.owner_id == owner_id && a.slug == slug))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.get(id).map(|e| {
            let mut u = e.value().0.clone();
            u.balance_cents = e.value().1.0.load(Ordering::SeqCst);
            u
        }))
    }

    async fn ensure_exists(&self, id: &str, email: &str, tier: Tier) -> Result<(), RepositoryError> {
        self.users.entry(id.to_string()).or_insert_with(|| {
            (
                User {
                    id: id.to_string(),
                    email: email.to_string(),
                    tier,
                    tier_expires_at: None,
                    balance_cents: 0,
                    auto_topup_enabled: false,
                },
                AtomicBalance(AtomicI64::new(0)),
            )
        });
        Ok(())
    }
}

#[async_trait]
impl ApiTokenRepository for InMemoryStore {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ApiTokenRecord>, RepositoryError> {
        Ok(self.tokens.get(token_hash).map(|e| e.value().clone()))
    }

    async fn touch_last_used(&self, token_hash: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(mut entry) = self.tokens.get_mut(token_hash) {
            entry.last_used_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn list_for(&self, user_id: &str, app_id: &str) -> Result<Vec<PermissionRow>, RepositoryError> {
        Ok(self
            .permissions
            .get(&(user_id.to_string(), app_id.to_string()))
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn increment_budget(
        &self,
        user_id: &str,
        app_id: &str,
        function_name: &str,
        by: i64,
    ) -> Result<(), RepositoryError> {
        if let Some(mut rows) = self
            .permissions
            .get_mut(&(user_id.to_string(), app_id.to_string()))
        {
            if let Some(row) = rows.iter_mut().find(|r| r.function_name == function_name) {
                row.budget_used += by;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceLedger for InMemoryStore {
    async fn transfer_balance(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        amount_cents: i64,
    ) -> Result<TransferOutcome, RepositoryError> {
        let from = self
            .users
            .get(from_user_id)
            .ok_or(RepositoryError::NotFound)?;
        // Optimistic check-then-set; the real store does this atomically
        // inside `transfer_balance` (spec §4.8).
        let current = from.1.0.load(Ordering::SeqCst);
        if current < amount_cents {
            return Ok(TransferOutcome::InsufficientFunds);
        }
        drop(from);

        self.users
            .get(from_user_id)
            .ok_or(RepositoryError::NotFound)?
            .1
            .0
            .fetch_sub(amount_cents, Ordering::SeqCst);
        self.users
            .entry(to_user_id.to_string())
            .or_insert_with(|| {
                (
                    User {
                        id: to_user_id.to_string(),
                        email: String::new(),
                        tier: Tier::Free,
                        tier_expires_at: None,
                        balance_cents: 0,
                        auto_topup_enabled: false,
                    },
                    AtomicBalance(AtomicI64::new(0)),
                )
            })
            .1
            .0
            .fetch_add(amount_cents, Ordering::SeqCst);

        Ok(TransferOutcome::Settled)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn fetch_first(
        &self,
        storage_key: &str,
        candidate_filenames: &[&str],
    ) -> Result<Option<(String, String)>, RepositoryError> {
        let Some(files) = self.objects.get(storage_key) else {
            return Ok(None);
        };
        for name in candidate_filenames {
            if let Some(contents) = files.get(*name) {
                return Ok(Some(((*name).to_string(), contents.clone())));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl SecretStore for InMemoryStore {
    async fn fetch_for(
        &self,
        user_id: &str,
        app_id: &str,
    ) -> Result<BTreeMap<String, String>, RepositoryError> {
        Ok(self
            .secrets
            .get(&(user_id.to_string(), app_id.to_string()))
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn fetch(&self, user_id: &str) -> Result<UserProfile, RepositoryError> {
        Ok(self.profiles.get(user_id).map(|e| e.value().clone()).unwrap_or_default())
    }
}
