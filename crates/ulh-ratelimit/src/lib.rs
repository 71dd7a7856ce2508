// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rate Limiter (C5, spec §4.5): five fixed-window checks fanned out in
//! parallel, failing open on remote-store trouble.
#![deny(unsafe_code)]

mod window;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use ulh_core::Tier;
use window::InProcessWindows;

#[derive(Debug, Error)]
#[error("rate limit store unavailable: {0}")]
pub struct CounterStoreError(pub String);

/// An atomic "increment then test" counter store (spec §4.5: "increment
/// *and* test in one remote call"). The production implementation talks to
/// a shared remote store (e.g. Redis); [`InProcessCounterStore`] is the
/// fail-open fallback and the implementation used by tests.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` in the window of length
    /// `window_seconds` containing now, returning whether the
    /// post-increment count is still within `limit`.
    async fn increment_and_check(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
    ) -> Result<bool, CounterStoreError>;
}

/// In-process fixed-window counters, swept once a minute.
pub struct InProcessCounterStore {
    windows: Arc<InProcessWindows>,
}

impl InProcessCounterStore {
    pub fn new() -> Self {
        let windows = Arc::new(InProcessWindows::new());
        let sweep_windows = Arc::clone(&windows);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                sweep_windows.sweep(3600);
            }
        });
        Self { windows }
    }
}

impl Default for InProcessCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InProcessCounterStore {
    async fn increment_and_check(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
    ) -> Result<bool, CounterStoreError> {
        Ok(self.windows.increment_and_check(key, window_seconds, limit))
    }
}

/// Configurable per-endpoint limits (spec §4.5 (a)).
#[derive(Debug, Clone, Copy)]
pub struct EndpointLimits {
    pub tools_list_per_minute: u32,
    pub tools_call_per_minute: u32,
    pub initialize_per_minute: u32,
}

impl Default for EndpointLimits {
    fn default() -> Self {
        Self {
            tools_list_per_minute: 30,
            tools_call_per_minute: 100,
            initialize_per_minute: 10,
        }
    }
}

/// Tier-scoped weekly call allowance (spec §4.5 (b)).
#[derive(Debug, Clone, Copy)]
pub struct WeeklyLimits {
    pub free: u32,
    pub pro: u32,
    pub enterprise: u32,
}

impl Default for WeeklyLimits {
    fn default() -> Self {
        Self { free: 1_000, pro: 20_000, enterprise: 200_000 }
    }
}

impl WeeklyLimits {
    #[must_use]
    pub fn for_tier(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free,
            Tier::Pro => self.pro,
            Tier::Enterprise => self.enterprise,
        }
    }
}

/// Everything the limiter needs to know about one `tools/call` admission
/// check. Other routed methods only exercise the per-endpoint check.
pub struct RateLimitRequest<'a> {
    pub method: &'a str,
    pub user_id: &'a str,
    pub tier: Tier,
    pub app_id: &'a str,
    pub is_owner: bool,
    pub app_calls_per_minute: Option<u32>,
    pub app_calls_per_day: Option<u32>,
}

/// Which of the five checks denied the call, surfaced for logging and for
/// the `-32000` response's `data` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Endpoint,
    UserWeekly,
    AppPerMinute,
    AppPerDay,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    endpoint_limits: EndpointLimits,
    weekly_limits: WeeklyLimits,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            endpoint_limits: EndpointLimits::default(),
            weekly_limits: WeeklyLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, endpoint: EndpointLimits, weekly: WeeklyLimits) -> Self {
        self.endpoint_limits = endpoint;
        self.weekly_limits = weekly;
        self
    }

    async fn check_one(&self, kind: RateLimitKind, key: String, window_seconds: u64, limit: u32) -> Option<RateLimitKind> {
        match self.store.increment_and_check(&key, window_seconds, limit).await {
            Ok(true) => None,
            Ok(false) => Some(kind),
            Err(e) => {
                warn!(error = %e, key = %key, "rate limit store unavailable, failing open");
                None
            }
        }
    }

    /// Run every applicable check in parallel; the first denial (in
    /// enumeration order, ties broken arbitrarily by `tokio::join!`) is
    /// returned. `Ok(())` means admitted.
    pub async fn check(&self, req: &RateLimitRequest<'_>) -> Result<(), RateLimitKind> {
        let endpoint_limit = match req.method {
            "tools/list" => self.endpoint_limits.tools_list_per_minute,
            "tools/call" => self.endpoint_limits.tools_call_per_minute,
            "initialize" => self.endpoint_limits.initialize_per_minute,
            _ => return Ok(()),
        };
        let endpoint_key = format!("mcp:{}", req.method);

        let weekly_limit = self.weekly_limits.for_tier(req.tier);
        let weekly_key = format!("user:{}:week", req.user_id);

        let app_minute_limit = (!req.is_owner).then_some(req.app_calls_per_minute).flatten();
        let app_minute_key = format!("app:{}:minute", req.app_id);

        let app_day_limit = (!req.is_owner).then_some(req.app_calls_per_day).flatten();
        let app_day_key = format!("app:{}:day", req.app_id);

        let (endpoint, weekly, app_minute, app_day) = tokio::join!(
            self.check_one(RateLimitKind::Endpoint, endpoint_key, 60, endpoint_limit),
            self.check_one(RateLimitKind::UserWeekly, weekly_key, 7 * 24 * 3600, weekly_limit),
            async {
                match app_minute_limit {
                    Some(limit) => self.check_one(RateLimitKind::AppPerMinute, app_minute_key, 60, limit).await,
                    None => None,
                }
            },
            async {
                match app_day_limit {
                    Some(limit) => self.check_one(RateLimitKind::AppPerDay, app_day_key, 1440 * 60, limit).await,
                    None => None,
                }
            },
        );

        endpoint.or(weekly).or(app_minute).or(app_day).map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(InProcessCounterStore::new()))
    }

    fn req<'a>(method: &'a str, user_id: &'a str, app_id: &'a str) -> RateLimitRequest<'a> {
        RateLimitRequest {
            method,
            user_id,
            tier: Tier::Free,
            app_id,
            is_owner: false,
            app_calls_per_minute: None,
            app_calls_per_day: None,
        }
    }

    #[tokio::test]
    async fn admits_within_endpoint_limit() {
        let limiter = limiter().with_limits(
            EndpointLimits { tools_call_per_minute: 2, ..Default::default() },
            WeeklyLimits::default(),
        );
        assert!(limiter.check(&req("tools/call", "u1", "a1")).await.is_ok());
        assert!(limiter.check(&req("tools/call", "u1", "a1")).await.is_ok());
        assert_eq!(limiter.check(&req("tools/call", "u1", "a1")).await, Err(RateLimitKind::Endpoint));
    }

    #[tokio::test]
    async fn owner_exempt_from_app_level_limits() {
        let limiter = limiter();
        let mut r = req("tools/call", "owner", "a1");
        r.is_owner = true;
        r.app_calls_per_minute = Some(0);
        for _ in 0..5 {
            assert!(limiter.check(&r).await.is_ok());
        }
    }

    #[tokio::test]
    async fn non_owner_hits_app_per_minute_cap() {
        let limiter = limiter();
        let mut r = req("tools/call", "caller", "a1");
        r.app_calls_per_minute = Some(1);
        assert!(limiter.check(&r).await.is_ok());
        assert_eq!(limiter.check(&r).await, Err(RateLimitKind::AppPerMinute));
    }

    #[tokio::test]
    async fn unroutable_method_is_always_admitted() {
        let limiter = limiter();
        assert!(limiter.check(&req("notifications/initialized", "u", "a")).await.is_ok());
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        struct AlwaysFails;
        #[async_trait]
        impl CounterStore for AlwaysFails {
            async fn increment_and_check(&self, _: &str, _: u64, _: u32) -> Result<bool, CounterStoreError> {
                Err(CounterStoreError("down".into()))
            }
        }
        let limiter = RateLimiter::new(Arc::new(AlwaysFails));
        assert!(limiter.check(&req("tools/call", "u1", "a1")).await.is_ok());
    }
}
