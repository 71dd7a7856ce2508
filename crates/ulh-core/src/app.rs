//! App metadata (spec §3 "App").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who may discover and invoke an app absent an explicit permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
}

/// Scope of a single `env_schema` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnvScope {
    Universal,
    PerUser,
}

/// One declared environment-variable requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnvSchemaEntry {
    pub scope: EnvScope,
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// A function exported by an app, as advertised in its manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestFunction {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_schema")]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object"})
}

/// Per-function pricing in cents; `default` is the fallback key.
pub type PricingConfig = BTreeMap<String, i64>;

/// Rate-limit overrides scoped to a single app (spec §4.5 (c)/(d)).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AppRateLimitConfig {
    #[serde(default)]
    pub calls_per_minute: Option<u32>,
    #[serde(default)]
    pub calls_per_day: Option<u32>,
}

/// Immutable snapshot of an app for the lifetime of a single request
/// (spec §3, §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct App {
    pub id: String,
    pub slug: String,
    pub owner_id: String,
    pub visibility: Visibility,
    pub storage_key: String,
    #[serde(default)]
    pub manifest: Option<Vec<ManifestFunction>>,
    #[serde(default)]
    pub skills_parsed: Vec<ManifestFunction>,
    #[serde(default)]
    pub skills_md: Option<String>,
    pub current_version: String,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub env_schema: BTreeMap<String, EnvSchemaEntry>,
    #[serde(default)]
    pub rate_limit_config: AppRateLimitConfig,
    #[serde(default)]
    pub pricing_config: PricingConfig,
    pub hosting_suspended: bool,
    #[serde(default)]
    pub upstream_db_config_id: Option<String>,
}

impl App {
    /// All function names this app advertises, manifest taking precedence
    /// over the legacy `skills_parsed` list.
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        match &self.manifest {
            Some(fns) => fns.iter().map(|f| f.name.as_str()).collect(),
            None => self.skills_parsed.iter().map(|f| f.name.as_str()).collect(),
        }
    }

    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<&ManifestFunction> {
        match &self.manifest {
            Some(fns) => fns.iter().find(|f| f.name == name),
            None => self.skills_parsed.iter().find(|f| f.name == name),
        }
    }

    /// Price in cents for invoking `function_name`: explicit entry, else
    /// `default`, else free (spec §4.8).
    #[must_use]
    pub fn price_for(&self, function_name: &str) -> i64 {
        self.pricing_config
            .get(function_name)
            .or_else(|| self.pricing_config.get("default"))
            .copied()
            .unwrap_or(0)
    }

    /// Per-user-scoped env keys this app requires (spec §4.6 step 3).
    #[must_use]
    pub fn per_user_keys(&self) -> Vec<&str> {
        self.env_schema
            .iter()
            .filter(|(_, entry)| entry.scope == EnvScope::PerUser)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Required per-user keys missing from `have`.
    #[must_use]
    pub fn missing_required_secrets(&self, have: &[String]) -> Vec<String> {
        self.env_schema
            .iter()
            .filter(|(_, entry)| entry.scope == EnvScope::PerUser && entry.required)
            .map(|(k, _)| k.clone())
            .filter(|k| !have.contains(k))
            .collect()
    }
}
