//! The per-call audit record (spec §4.10) and the field extraction/
//! truncation helpers that feed it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulh_core::Tier;

/// One entry in the append-only call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogRecord {
    pub user_id: String,
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub function_name: String,
    pub method: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    pub input: Value,
    #[serde(default)]
    pub output: Option<Value>,
    pub tier: Tier,
    pub ai_cost_cents: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub user_query: Option<String>,
    pub response_size_bytes: u64,
    pub estimated_execution_cost_cents: i64,
    pub balance_charge_cents: i64,
}

/// The two special args stripped from `input` before the sandbox sees it
/// (spec §4.10 "optional `user_query` string extracted from special
/// `_user_query`/`_session_id` args").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedCallFields {
    pub user_query: Option<String>,
    pub session_id: Option<String>,
}

/// Pull `_user_query` and `_session_id` out of an args object, returning
/// both the extracted fields and the args with those two keys removed.
/// Non-object `args` (or args missing either key) pass through unchanged.
#[must_use]
pub fn extract_call_fields(args: Value) -> (Value, ExtractedCallFields) {
    let Value::Object(mut map) = args else {
        return (args, ExtractedCallFields::default());
    };

    let user_query = map.remove("_user_query").and_then(|v| v.as_str().map(str::to_string));
    let session_id = map.remove("_session_id").and_then(|v| v.as_str().map(str::to_string));

    (Value::Object(map), ExtractedCallFields { user_query, session_id })
}

/// Replace `value` with a small placeholder if its serialized size exceeds
/// `max_bytes`, so oversized tool output doesn't blow up the log store
/// (spec §4.10 "output (truncated by policy)").
#[must_use]
pub fn truncate_output(value: &Value, max_bytes: usize) -> Value {
    let serialized = serde_json::to_string(value).unwrap_or_default();
    if serialized.len() <= max_bytes {
        return value.clone();
    }
    serde_json::json!({
        "truncated": true,
        "original_size_bytes": serialized.len(),
    })
}

/// Serialized byte size of `value`, used for `response_size_bytes`.
#[must_use]
pub fn payload_size_bytes(value: &Value) -> u64 {
    serde_json::to_string(value).map(|s| s.len() as u64).unwrap_or(0)
}
