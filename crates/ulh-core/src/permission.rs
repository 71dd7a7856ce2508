//! Permission rows (spec §3 "Permission row").

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reset cadence for a row's `budget_used` counter. The Constraint Evaluator
/// only computes the period start for informational purposes; it never
/// resets the counter itself (spec §4.4 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Hour,
    Day,
    Week,
    Month,
    Lifetime,
}

/// A time-of-day / day-of-week admission window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeWindow {
    pub start_hour: u8,
    pub end_hour: u8,
    #[serde(default)]
    pub days: Option<Vec<u8>>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// A scalar value usable in `allowed_args` whitelists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ArgScalar {
    String(String),
    Number(f64),
    Bool(bool),
}

impl ArgScalar {
    /// Parse a `serde_json::Value` into a scalar, if it is one.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(ArgScalar::String(s.clone())),
            serde_json::Value::Bool(b) => Some(ArgScalar::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(ArgScalar::Number),
            _ => None,
        }
    }
}

/// One `(granted_to_user, app, function_name)` authorization tuple
/// (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PermissionRow {
    pub granted_to_user: String,
    pub app_id: String,
    pub function_name: String,
    pub allowed: bool,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    #[serde(default)]
    pub budget_limit: Option<i64>,
    #[serde(default)]
    pub budget_used: i64,
    #[serde(default)]
    pub budget_period: Option<BudgetPeriod>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allowed_args: BTreeMap<String, Vec<ArgScalar>>,
}

impl PermissionRow {
    /// A minimal unrestricted row granting `function_name` to `user` on `app`.
    #[must_use]
    pub fn allow(user: impl Into<String>, app_id: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            granted_to_user: user.into(),
            app_id: app_id.into(),
            function_name: function_name.into(),
            allowed: true,
            allowed_ips: Vec::new(),
            time_window: None,
            budget_limit: None,
            budget_used: 0,
            budget_period: None,
            expires_at: None,
            allowed_args: BTreeMap::new(),
        }
    }
}

/// The Permission Resolver's result for a (user, app) pair (spec §4.4).
///
/// `None` means "no restrictions" (owner, or public/unlisted visibility).
pub type ResolvedPermissions = Option<PermissionSet>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PermissionSet {
    pub allowed: Vec<String>,
    pub rows: Vec<PermissionRow>,
}

impl PermissionSet {
    #[must_use]
    pub fn row_for(&self, function_name: &str) -> Option<&PermissionRow> {
        self.rows.iter().find(|r| r.function_name == function_name)
    }

    #[must_use]
    pub fn is_allowed(&self, function_name: &str) -> bool {
        self.allowed.iter().any(|f| f == function_name)
    }
}
