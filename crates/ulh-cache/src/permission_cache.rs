//! Permission cache: the caching half of the Permission Resolver (C3, spec
//! §4.4). Resolution logic itself lives in `ulh-policy`; this module owns
//! the LRU+TTL cache and the DB round-trip.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use ulh_core::ResolvedPermissions;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: String,
    app_id: String,
}

struct CacheEntry {
    resolved: ResolvedPermissions,
    stored_at: DateTime<Utc>,
}

/// LRU+TTL cache of resolved permission sets, keyed by `(user, app)`.
///
/// A denied user (`Some(PermissionSet { allowed: [], .. })`) is cached
/// identically to an authorized one, which is the point: it stops repeated
/// DB lookups for unauthorized probing (spec §4.4).
pub struct PermissionCache {
    entries: DashMap<CacheKey, CacheEntry>,
    order: Mutex<VecDeque<CacheKey>>,
    capacity: usize,
    ttl: Duration,
}

impl PermissionCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
            ttl,
        }
    }

    #[must_use]
    pub fn with_default_ttl(capacity: usize) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    /// Resolve `(user_id, app_id)`, using the cache if fresh, else calling
    /// `resolver` and caching its result.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        user_id: &str,
        app_id: &str,
        now: DateTime<Utc>,
        resolver: F,
    ) -> ResolvedPermissions
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ResolvedPermissions>,
    {
        let key = CacheKey { user_id: user_id.to_string(), app_id: app_id.to_string() };

        if let Some(entry) = self.entries.get(&key) {
            if now.signed_duration_since(entry.stored_at).to_std().unwrap_or(Duration::MAX) < self.ttl {
                return entry.resolved.clone();
            }
        }

        let resolved = resolver().await;
        self.insert(key, resolved.clone(), now);
        resolved
    }

    fn insert(&self, key: CacheKey, resolved: ResolvedPermissions, now: DateTime<Utc>) {
        self.entries.insert(key.clone(), CacheEntry { resolved, stored_at: now });
        self.touch(key);
    }

    fn touch(&self, key: CacheKey) {
        let mut order = self.order.lock().unwrap();
        order.retain(|k| k != &key);
        order.push_back(key);
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    /// Invalidate a cached entry, e.g. on a write through the permissions
    /// admin API (spec §4.4).
    pub fn invalidate(&self, user_id: &str, app_id: &str) {
        let key = CacheKey { user_id: user_id.to_string(), app_id: app_id.to_string() };
        self.entries.remove(&key);
        self.order.lock().unwrap().retain(|k| k != &key);
    }

    /// Mutate a cached row's `budget_used` in place and return the new
    /// value, so a successful admit's budget increment is visible to the
    /// very next call without waiting on the best-effort DB write (spec
    /// §4.4 "On admit").
    pub fn increment_budget(&self, user_id: &str, app_id: &str, function_name: &str, by: i64) -> Option<i64> {
        let key = CacheKey { user_id: user_id.to_string(), app_id: app_id.to_string() };
        let mut entry = self.entries.get_mut(&key)?;
        let set = entry.resolved.as_mut()?;
        let row = set.rows.iter_mut().find(|r| r.function_name == function_name)?;
        row.budget_used += by;
        Some(row.budget_used)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulh_core::{PermissionRow, PermissionSet};

    fn at(offset_secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_800_000_000 + offset_secs, 0).unwrap()
    }

    #[tokio::test]
    async fn caches_result_within_ttl() {
        let cache = PermissionCache::new(10, Duration::from_secs(60));
        let mut calls = 0;

        let resolved = cache
            .get_or_resolve("u1", "app1", at(0), || async {
                calls += 1;
                None
            })
            .await;
        assert!(resolved.is_none());
        assert_eq!(calls, 1);

        cache.get_or_resolve("u1", "app1", at(10), || async { unreachable!() }).await;
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = PermissionCache::new(10, Duration::from_secs(60));
        cache.get_or_resolve("u1", "app1", at(0), || async { None }).await;

        let mut refetched = false;
        cache
            .get_or_resolve("u1", "app1", at(61), || async {
                refetched = true;
                None
            })
            .await;
        assert!(refetched);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = PermissionCache::new(10, Duration::from_secs(60));
        cache.get_or_resolve("u1", "app1", at(0), || async { None }).await;
        cache.invalidate("u1", "app1");

        let mut refetched = false;
        cache
            .get_or_resolve("u1", "app1", at(1), || async {
                refetched = true;
                None
            })
            .await;
        assert!(refetched);
    }

    #[tokio::test]
    async fn increment_budget_mutates_cached_row() {
        let cache = PermissionCache::new(10, Duration::from_secs(60));
        let row = PermissionRow::allow("u1", "app1", "summarize");
        let set = Some(PermissionSet { allowed: vec!["summarize".into()], rows: vec![row] });

        cache.get_or_resolve("u1", "app1", at(0), || async { set }).await;
        let new_used = cache.increment_budget("u1", "app1", "summarize", 3);
        assert_eq!(new_used, Some(3));
    }
}
