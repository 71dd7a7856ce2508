// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fluent builder for constructing [`CallLogRecord`]s.

use chrono::{DateTime, Utc};
use serde_json::Value;
use ulh_core::Tier;

use crate::record::{payload_size_bytes, CallLogRecord};

/// Fluent builder for a single call log entry.
///
/// ```
/// use ulh_audit::{CallLogBuilder, CallLogRecord};
/// use ulh_core::Tier;
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let record = CallLogBuilder::new("u1", "app1", "summarize", "tools/call")
///     .app_metadata("Summarizer", "v3")
///     .tier(Tier::Pro)
///     .timed(now, now)
///     .success(serde_json::json!({"ok": true}))
///     .build();
///
/// assert!(record.success);
/// ```
#[derive(Debug)]
pub struct CallLogBuilder {
    user_id: String,
    app_id: String,
    app_name: String,
    app_version: String,
    function_name: String,
    method: String,
    success: bool,
    duration_ms: u64,
    error: Option<String>,
    input: Value,
    output: Option<Value>,
    tier: Tier,
    ai_cost_cents: i64,
    session_id: Option<String>,
    sequence: Option<u64>,
    user_query: Option<String>,
    estimated_execution_cost_cents: i64,
    balance_charge_cents: i64,
}

impl CallLogBuilder {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        app_id: impl Into<String>,
        function_name: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            app_id: app_id.into(),
            app_name: String::new(),
            app_version: String::new(),
            function_name: function_name.into(),
            method: method.into(),
            success: false,
            duration_ms: 0,
            error: None,
            input: Value::Null,
            output: None,
            tier: Tier::Free,
            ai_cost_cents: 0,
            session_id: None,
            sequence: None,
            user_query: None,
            estimated_execution_cost_cents: 0,
            balance_charge_cents: 0,
        }
    }

    #[must_use]
    pub fn app_metadata(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_name = name.into();
        self.app_version = version.into();
        self
    }

    #[must_use]
    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    #[must_use]
    pub fn input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Set start/finish timestamps; `duration_ms` is derived.
    #[must_use]
    pub fn timed(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        self
    }

    #[must_use]
    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    #[must_use]
    pub fn ai_cost_cents(mut self, cents: i64) -> Self {
        self.ai_cost_cents = cents;
        self
    }

    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>, sequence: u64) -> Self {
        self.session_id = Some(session_id.into());
        self.sequence = Some(sequence);
        self
    }

    #[must_use]
    pub fn user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }

    #[must_use]
    pub fn estimated_execution_cost_cents(mut self, cents: i64) -> Self {
        self.estimated_execution_cost_cents = cents;
        self
    }

    #[must_use]
    pub fn balance_charge_cents(mut self, cents: i64) -> Self {
        self.balance_charge_cents = cents;
        self
    }

    /// Mark the call successful, recording `output`.
    #[must_use]
    pub fn success(mut self, output: Value) -> Self {
        self.success = true;
        self.output = Some(output);
        self.error = None;
        self
    }

    /// Mark the call failed, recording an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.output = None;
        self
    }

    #[must_use]
    pub fn build(self) -> CallLogRecord {
        let response_size_bytes = self.output.as_ref().map_or(0, payload_size_bytes);
        CallLogRecord {
            user_id: self.user_id,
            app_id: self.app_id,
            app_name: self.app_name,
            app_version: self.app_version,
            function_name: self.function_name,
            method: self.method,
            success: self.success,
            duration_ms: self.duration_ms,
            error: self.error,
            input: self.input,
            output: self.output,
            tier: self.tier,
            ai_cost_cents: self.ai_cost_cents,
            session_id: self.session_id,
            sequence: self.sequence,
            user_query: self.user_query,
            response_size_bytes,
            estimated_execution_cost_cents: self.estimated_execution_cost_cents,
            balance_charge_cents: self.balance_charge_cents,
        }
    }
}
