//! User accounts and bearer credentials (spec §3 "Identities & credentials").

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Subscription tier. Affects weekly rate-limit allowances (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Free
    }
}

/// A platform account.
///
/// Created at first sign-in; `tier` may be downgraded by an external
/// sweeper out of scope for this crate (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: String,
    pub email: String,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_expires_at: Option<DateTime<Utc>>,
    /// Hosting balance in cents. May go negative (triggers hosting suspension
    /// for apps the user owns, handled by the Billing Settler).
    pub balance_cents: i64,
    pub auto_topup_enabled: bool,
}

/// An `ul_<opaque>` API token, stored hashed with a short display prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiTokenRecord {
    pub token_hash: String,
    pub token_prefix: String,
    pub user_id: String,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Empty means unrestricted; `["*"]` is the explicit wildcard form.
    #[serde(default)]
    pub app_ids: Vec<String>,
    #[serde(default)]
    pub function_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiTokenRecord {
    /// Whether `app_id` is within this token's scope (empty or `*` = unrestricted).
    #[must_use]
    pub fn allows_app(&self, app_id: &str) -> bool {
        self.app_ids.is_empty()
            || self.app_ids.iter().any(|a| a == "*" || a == app_id)
    }

    /// Whether `function_name` is within this token's scope.
    #[must_use]
    pub fn allows_function(&self, function_name: &str) -> bool {
        self.function_names.is_empty()
            || self
                .function_names
                .iter()
                .any(|f| f == "*" || f == function_name)
    }
}

/// The identity established by the Token Verifier (spec §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VerifiedCaller {
    pub user_id: String,
    pub email: String,
    pub tier: Tier,
    /// `None` for JWT callers (unrestricted); `Some` for API-token callers.
    pub scope: Option<TokenScope>,
}

/// The scope carried by an API token, if the caller authenticated with one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TokenScope {
    pub app_ids: Vec<String>,
    pub function_names: Vec<String>,
}

impl TokenScope {
    #[must_use]
    pub fn allows(&self, app_id: &str, function_name: &str) -> bool {
        let app_ok = self.app_ids.is_empty() || self.app_ids.iter().any(|a| a == "*" || a == app_id);
        let fn_ok = self.function_names.is_empty()
            || self
                .function_names
                .iter()
                .any(|f| f == "*" || f == function_name);
        app_ok && fn_ok
    }
}
