// SPDX-License-Identifier: MIT OR Apache-2.0
//! Permission Resolver (C3) and Constraint Evaluator (C4) — spec §4.4.
//!
//! Both halves are pure: [`resolve`] turns app ownership/visibility plus raw
//! permission rows into a [`ulh_core::ResolvedPermissions`], and [`evaluate`]
//! decides admit/deny for a single row against a call's IP, clock, and
//! arguments. Caching (LRU+TTL) and the DB round-trip live in `ulh-cache`;
//! this crate never talks to a store.
#![deny(unsafe_code)]

mod cidr;
mod window;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulh_core::{ArgScalar, BudgetPeriod, PermissionRow, PermissionSet, ResolvedPermissions, Visibility};

/// Context a single call is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct EvalContext<'a> {
    pub client_ip: Option<&'a str>,
    pub now: Option<DateTime<Utc>>,
    pub args: Option<&'a serde_json::Value>,
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
}

impl Decision {
    #[must_use]
    pub fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    #[must_use]
    pub fn deny(reason: DenyReason) -> Self {
        Self { allowed: false, reason: Some(reason) }
    }
}

/// Why [`evaluate`] denied a call. Matches the ordered checks in spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Expired,
    IpNotAllowed,
    OutsideTimeWindow,
    BudgetExhausted,
    ArgumentNotAllowed,
}

/// Resolve (user, app) into the Permission Resolver's result (spec §4.4
/// "Resolver contract").
///
/// Returns `None` ("no restrictions") when the caller owns the app or the
/// app's visibility is public/unlisted; otherwise packages `rows` into the
/// set of allowed function names plus the raw rows the evaluator consumes.
#[must_use]
pub fn resolve(
    user_id: &str,
    owner_id: &str,
    visibility: Visibility,
    rows: Vec<PermissionRow>,
) -> ResolvedPermissions {
    if user_id == owner_id || matches!(visibility, Visibility::Public | Visibility::Unlisted) {
        return None;
    }
    let allowed = rows
        .iter()
        .filter(|r| r.allowed)
        .map(|r| r.function_name.clone())
        .collect();
    Some(PermissionSet { allowed, rows })
}

/// Evaluate a single permission row against the current call (spec §4.4
/// "Evaluator contract"). First failing check wins; order is significant.
#[must_use]
pub fn evaluate(row: &PermissionRow, ctx: &EvalContext) -> Decision {
    let now = ctx.now.unwrap_or_else(Utc::now);

    if let Some(expires_at) = row.expires_at {
        if now >= expires_at {
            return Decision::deny(DenyReason::Expired);
        }
    }

    if !row.allowed_ips.is_empty() {
        if let Some(client_ip) = ctx.client_ip {
            if !row.allowed_ips.iter().any(|entry| cidr::matches(entry, client_ip)) {
                return Decision::deny(DenyReason::IpNotAllowed);
            }
        }
    }

    if let Some(tw) = &row.time_window {
        if !window::within(tw, now) {
            return Decision::deny(DenyReason::OutsideTimeWindow);
        }
    }

    if let Some(limit) = row.budget_limit {
        if row.budget_used >= limit {
            return Decision::deny(DenyReason::BudgetExhausted);
        }
    }

    if !row.allowed_args.is_empty() {
        if let Some(args) = ctx.args {
            if let Some(obj) = args.as_object() {
                for (param, whitelist) in &row.allowed_args {
                    let Some(supplied) = obj.get(param) else {
                        continue;
                    };
                    let Some(scalar) = ArgScalar::from_json(supplied) else {
                        return Decision::deny(DenyReason::ArgumentNotAllowed);
                    };
                    if !whitelist.contains(&scalar) {
                        return Decision::deny(DenyReason::ArgumentNotAllowed);
                    }
                }
            }
        }
    }

    Decision::allow()
}

/// The start of `period`, as of `now`, per spec §4.4 step 4. Informational
/// only — this crate never resets a row's `budget_used`.
#[must_use]
pub fn period_start(period: BudgetPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        BudgetPeriod::Hour => now
            .date_naive()
            .and_hms_opt(now.hour(), 0, 0)
            .unwrap()
            .and_utc(),
        BudgetPeriod::Day => now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc(),
        BudgetPeriod::Week => {
            let days_since_sunday = now.weekday().num_days_from_sunday() as i64;
            (now - chrono::Duration::days(days_since_sunday))
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
        }
        BudgetPeriod::Month => chrono::NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc(),
        BudgetPeriod::Lifetime => DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
    }
}

/// Apply a per-call argument whitelist check in isolation, for callers that
/// only need that one step (e.g. a dry-run validator). Exposed for symmetry
/// with [`evaluate`]'s other sub-checks; not used by the evaluator itself.
#[must_use]
pub fn args_allowed(allowed_args: &BTreeMap<String, Vec<ArgScalar>>, args: &serde_json::Value) -> bool {
    let Some(obj) = args.as_object() else {
        return true;
    };
    for (param, whitelist) in allowed_args {
        if let Some(supplied) = obj.get(param) {
            match ArgScalar::from_json(supplied) {
                Some(scalar) if whitelist.contains(&scalar) => {}
                _ => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, hour, 0, 0).unwrap()
    }

    #[test]
    fn owner_needs_no_row() {
        assert!(resolve("u1", "u1", Visibility::Private, vec![]).is_none());
    }

    #[test]
    fn public_app_has_no_restrictions() {
        assert!(resolve("u1", "owner", Visibility::Public, vec![]).is_none());
    }

    #[test]
    fn private_app_restricts_to_rows() {
        let rows = vec![PermissionRow::allow("u1", "app1", "summarize")];
        let resolved = resolve("u1", "owner", Visibility::Private, rows).unwrap();
        assert!(resolved.is_allowed("summarize"));
        assert!(!resolved.is_allowed("translate"));
    }

    #[test]
    fn denied_user_caches_an_empty_allowed_set_not_an_error() {
        let mut row = PermissionRow::allow("u1", "app1", "summarize");
        row.allowed = false;
        let resolved = resolve("u1", "owner", Visibility::Private, vec![row]).unwrap();
        assert!(!resolved.is_allowed("summarize"));
    }

    #[test]
    fn expiry_is_checked_first() {
        let mut row = PermissionRow::allow("u1", "app1", "fn");
        row.expires_at = Some(at(0));
        row.allowed_ips = vec!["10.0.0.1".into()]; // would also fail, but expiry wins
        let ctx = EvalContext { client_ip: Some("10.0.0.2"), now: Some(at(1)), args: None };
        let decision = evaluate(&row, &ctx);
        assert_eq!(decision.reason, Some(DenyReason::Expired));
    }

    #[test]
    fn ip_allowlist_blocks_unlisted_ip() {
        let mut row = PermissionRow::allow("u1", "app1", "fn");
        row.allowed_ips = vec!["10.0.0.0/24".into()];
        let ctx = EvalContext { client_ip: Some("192.168.1.1"), now: Some(at(1)), args: None };
        assert_eq!(evaluate(&row, &ctx).reason, Some(DenyReason::IpNotAllowed));
    }

    #[test]
    fn ip_check_skipped_when_client_ip_absent() {
        let mut row = PermissionRow::allow("u1", "app1", "fn");
        row.allowed_ips = vec!["10.0.0.0/24".into()];
        let ctx = EvalContext { client_ip: None, now: Some(at(1)), args: None };
        assert!(evaluate(&row, &ctx).allowed);
    }

    #[test]
    fn budget_exhausted_denies() {
        let mut row = PermissionRow::allow("u1", "app1", "fn");
        row.budget_limit = Some(10);
        row.budget_used = 10;
        let ctx = EvalContext { now: Some(at(1)), ..Default::default() };
        assert_eq!(evaluate(&row, &ctx).reason, Some(DenyReason::BudgetExhausted));
    }

    #[test]
    fn argument_whitelist_blocks_unlisted_value() {
        let mut row = PermissionRow::allow("u1", "app1", "fn");
        row.allowed_args.insert("region".to_string(), vec![ArgScalar::String("us".into())]);
        let ctx = EvalContext {
            now: Some(at(1)),
            args: Some(&serde_json::json!({"region": "eu"})),
            ..Default::default()
        };
        assert_eq!(evaluate(&row, &ctx).reason, Some(DenyReason::ArgumentNotAllowed));
    }

    #[test]
    fn argument_not_in_whitelist_map_is_unrestricted() {
        let mut row = PermissionRow::allow("u1", "app1", "fn");
        row.allowed_args.insert("region".to_string(), vec![ArgScalar::String("us".into())]);
        let ctx = EvalContext {
            now: Some(at(1)),
            args: Some(&serde_json::json!({"other_param": "anything"})),
            ..Default::default()
        };
        assert!(evaluate(&row, &ctx).allowed);
    }

    #[test]
    fn fully_unrestricted_row_admits() {
        let row = PermissionRow::allow("u1", "app1", "fn");
        let ctx = EvalContext { now: Some(at(1)), ..Default::default() };
        assert!(evaluate(&row, &ctx).allowed);
    }

    #[test]
    fn period_start_week_is_previous_or_same_sunday() {
        // 2026-07-28 is a Tuesday; the preceding Sunday is 2026-07-26.
        let start = period_start(BudgetPeriod::Week, at(15));
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2026-07-26");
    }

    #[test]
    fn period_start_lifetime_is_epoch() {
        assert_eq!(period_start(BudgetPeriod::Lifetime, at(15)).timestamp(), 0);
    }
}
