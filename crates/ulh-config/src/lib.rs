// SPDX-License-Identifier: MIT OR Apache-2.0
//! Startup configuration.
//!
//! This is the only crate in the workspace permitted to call
//! `std::env::var` (spec §9's resolved open question on env lookups
//! buried in handler bodies); every other crate receives typed config
//! values constructed here. Reading goes through an [`EnvSource`]
//! rather than the process environment directly so validation can be
//! exercised deterministically in tests.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while assembling [`HostConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable was not set. The core MUST NOT substitute an
    /// insecure default for it (spec §6 "Environment").
    #[error("missing required environment variable: {var}")]
    MissingRequired {
        /// The variable name.
        var: String,
    },
    /// A variable was set but could not be parsed as the expected type.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why parsing failed.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// EnvSource
// ---------------------------------------------------------------------------

/// A source of named string values, abstracting over the process
/// environment so config assembly can be tested without mutating
/// global state.
pub trait EnvSource {
    /// Look up a variable by name.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed map of variables, for tests.
impl EnvSource for BTreeMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| (*v).to_string())
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Per-endpoint rate limit defaults (spec §4.5's rule (a)), overridable
/// by environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDefaults {
    /// `mcp:tools/list` calls allowed per user per minute.
    pub tools_list_per_minute: u32,
    /// `mcp:tools/call` calls allowed per user per minute.
    pub tools_call_per_minute: u32,
    /// `mcp:initialize` calls allowed per user per minute.
    pub initialize_per_minute: u32,
}

impl Default for RateLimitDefaults {
    fn default() -> Self {
        Self { tools_list_per_minute: 30, tools_call_per_minute: 100, initialize_per_minute: 10 }
    }
}

/// Top-level runtime configuration for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Relational store connection string.
    pub database_url: String,
    /// Object store endpoint used for app code and uploaded assets.
    pub object_store_url: String,
    /// Object store access key, if the backend requires one.
    pub object_store_access_key: Option<String>,
    /// Object store secret key, if the backend requires one.
    pub object_store_secret_key: Option<String>,
    /// PBKDF2 master key for the crypto envelope (spec §4.11). Never
    /// defaulted; a missing value is a hard startup error.
    pub crypto_master_key: String,
    /// Public base URL, used to build `WWW-Authenticate` and discovery
    /// document URLs.
    pub base_url: String,
    /// Fallback LLM API key used when a caller has no BYOK key of their
    /// own configured. Optional: absent means BYOK-only.
    pub default_llm_api_key: Option<String>,
    /// Rate limit defaults (spec §4.5).
    pub rate_limits: RateLimitDefaults,
}

const VAR_DATABASE_URL: &str = "ULH_DATABASE_URL";
const VAR_OBJECT_STORE_URL: &str = "ULH_OBJECT_STORE_URL";
const VAR_OBJECT_STORE_ACCESS_KEY: &str = "ULH_OBJECT_STORE_ACCESS_KEY";
const VAR_OBJECT_STORE_SECRET_KEY: &str = "ULH_OBJECT_STORE_SECRET_KEY";
const VAR_CRYPTO_MASTER_KEY: &str = "ULH_CRYPTO_MASTER_KEY";
const VAR_BASE_URL: &str = "ULH_BASE_URL";
const VAR_DEFAULT_LLM_API_KEY: &str = "ULH_DEFAULT_LLM_API_KEY";
const VAR_RATE_LIMIT_TOOLS_LIST: &str = "ULH_RATE_LIMIT_TOOLS_LIST_PER_MINUTE";
const VAR_RATE_LIMIT_TOOLS_CALL: &str = "ULH_RATE_LIMIT_TOOLS_CALL_PER_MINUTE";
const VAR_RATE_LIMIT_INITIALIZE: &str = "ULH_RATE_LIMIT_INITIALIZE_PER_MINUTE";

impl HostConfig {
    /// Assemble configuration from the real process environment.
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::load(&ProcessEnv)
    }

    /// Assemble configuration from any [`EnvSource`].
    pub fn load(source: &dyn EnvSource) -> Result<Self, ConfigError> {
        let database_url = require(source, VAR_DATABASE_URL)?;
        let object_store_url = require(source, VAR_OBJECT_STORE_URL)?;
        let object_store_access_key = source.var(VAR_OBJECT_STORE_ACCESS_KEY);
        let object_store_secret_key = source.var(VAR_OBJECT_STORE_SECRET_KEY);
        let crypto_master_key = require(source, VAR_CRYPTO_MASTER_KEY)?;
        let base_url = require(source, VAR_BASE_URL)?;
        let default_llm_api_key = source.var(VAR_DEFAULT_LLM_API_KEY);

        let defaults = RateLimitDefaults::default();
        let rate_limits = RateLimitDefaults {
            tools_list_per_minute: optional_u32(source, VAR_RATE_LIMIT_TOOLS_LIST, defaults.tools_list_per_minute)?,
            tools_call_per_minute: optional_u32(source, VAR_RATE_LIMIT_TOOLS_CALL, defaults.tools_call_per_minute)?,
            initialize_per_minute: optional_u32(source, VAR_RATE_LIMIT_INITIALIZE, defaults.initialize_per_minute)?,
        };

        Ok(Self {
            database_url,
            object_store_url,
            object_store_access_key,
            object_store_secret_key,
            crypto_master_key,
            base_url,
            default_llm_api_key,
            rate_limits,
        })
    }

    /// The `resource_metadata` URL carried on `WWW-Authenticate` headers
    /// for auth failures (spec §4.1).
    #[must_use]
    pub fn oauth_protected_resource_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }
}

fn require(source: &dyn EnvSource, var: &str) -> Result<String, ConfigError> {
    source.var(var).filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingRequired { var: var.to_string() })
}

fn optional_u32(source: &dyn EnvSource, var: &str, default: u32) -> Result<u32, ConfigError> {
    match source.var(var) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidValue { var: var.to_string(), reason: e.to_string() }),
    }
}
