//! Typed repository interfaces hiding the relational store's REST-ish
//! surface and stored procedures (`transfer_balance`, `check_rate_limit`,
//! …) and the object store behind narrow, mockable traits (Design Notes §9
//! "Relational-store RPC coupling").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use ulh_core::{ApiTokenRecord, App, PermissionRow, Tier, User};

/// Errors surfaced by a repository call. Callers are expected to apply
/// spec's documented fail-open/fail-closed policy per component (§5), not
/// this crate.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("transport error talking to the backing store: {0}")]
    Transport(String),
    #[error("row not found")]
    NotFound,
    #[error("conflicting concurrent write")]
    Conflict,
}

/// Outcome of [`BalanceLedger::transfer_balance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Funds moved; both balances updated atomically.
    Settled,
    /// `from`'s balance was insufficient; no balances changed.
    InsufficientFunds,
}

/// Resolves apps by id or slug (spec §4.3 App Loader, C2).
#[async_trait]
pub trait AppRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<App>, RepositoryError>;
    async fn find_by_slug(&self, owner_id: &str, slug: &str) -> Result<Option<App>, RepositoryError>;
}

/// User accounts (spec §3 "User").
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    /// Best-effort upsert on first sign-in; failures must not abort the
    /// calling request (spec §4.2).
    async fn ensure_exists(&self, id: &str, email: &str, tier: Tier) -> Result<(), RepositoryError>;
}

/// API token records, looked up by SHA-256 hash of the full token
/// (spec §4.2).
#[async_trait]
pub trait ApiTokenRepository: Send + Sync {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ApiTokenRecord>, RepositoryError>;

    /// Best-effort `last_used_at` bump; failures are swallowed by the caller.
    async fn touch_last_used(&self, token_hash: &str, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

/// Permission rows for a `(user, app)` pair, plus the budget write-back
/// used on admit (spec §4.4).
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn list_for(&self, user_id: &str, app_id: &str) -> Result<Vec<PermissionRow>, RepositoryError>;

    /// Best-effort persistence of a budget increment; cache-layer state is
    /// the source of truth for the life of the TTL (spec §4.4, §8 invariant
    /// 10).
    async fn increment_budget(
        &self,
        user_id: &str,
        app_id: &str,
        function_name: &str,
        by: i64,
    ) -> Result<(), RepositoryError>;
}

/// Atomic balance transfer, backed by the relational store's
/// `transfer_balance` stored procedure (spec §4.8).
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    async fn transfer_balance(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        amount_cents: i64,
    ) -> Result<TransferOutcome, RepositoryError>;
}

/// Content-addressed app source blobs (spec §4.6 Code Cache miss path).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Try each of `candidate_filenames` under `storage_key` in order,
    /// returning the first that resolves.
    async fn fetch_first(
        &self,
        storage_key: &str,
        candidate_filenames: &[&str],
    ) -> Result<Option<(String, String)>, RepositoryError>;
}

/// Per-`(user, app)` secrets, stored as encrypted blobs (spec §4.6 step 3).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_for(
        &self,
        user_id: &str,
        app_id: &str,
    ) -> Result<BTreeMap<String, String>, RepositoryError>;
}

/// A user's BYOK configuration and platform-level upstream database
/// reference (spec §4.6 steps 4–5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub byok_enabled: bool,
    pub byok_provider: Option<String>,
    pub byok_encrypted_key: Option<String>,
    pub platform_db_config_id: Option<String>,
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch(&self, user_id: &str) -> Result<UserProfile, RepositoryError>;
}
