//! JSON-RPC 2.0 request/response envelope (spec §6 "Transport").

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ulh_error::{ErrorCode, HostError, RpcErrorObject};

/// A JSON-RPC `id`: a number, a string, or `null`. Distinct from an
/// *absent* `id`, which marks a notification (spec §6, resolved open
/// question: `id=0` is a real id and always gets a response; an absent
/// `id` never does).
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
    Null,
}

impl Serialize for JsonRpcId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_i64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Number)
                .ok_or_else(|| de::Error::custom("jsonrpc id must be an integer, string, or null")),
            _ => Err(de::Error::custom("jsonrpc id must be an integer, string, or null")),
        }
    }
}

/// A parsed request envelope, id already separated from presence: `id:
/// None` means the `id` field was entirely absent from the body (a
/// notification); `id: Some(JsonRpcId::Null)` means it was present and
/// literally `null`.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    pub id: Option<JsonRpcId>,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    /// `true` if this request carries no `id` and therefore expects no
    /// response body (spec §4.1's `notifications/initialized` handling).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Parse a raw HTTP body as a JSON-RPC 2.0 request.
///
/// Distinguishes the spec's two client-framing failures: `-32700` for a
/// body that isn't valid JSON at all, `-32600` for valid JSON missing
/// `jsonrpc: "2.0"` or a string `method`.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, HostError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| HostError::new(ErrorCode::ParseError, format!("Parse error: {e}")))?;

    let Value::Object(mut map) = value else {
        return Err(HostError::new(ErrorCode::InvalidRequest, "request body must be a JSON object"));
    };

    let version_ok = matches!(map.get("jsonrpc"), Some(Value::String(v)) if v == "2.0");
    if !version_ok {
        return Err(HostError::new(ErrorCode::InvalidRequest, "missing or invalid jsonrpc version"));
    }

    let method = match map.remove("method") {
        Some(Value::String(m)) => m,
        _ => return Err(HostError::new(ErrorCode::InvalidRequest, "missing method")),
    };

    let id = match map.remove("id") {
        None => None,
        Some(id_value) => Some(
            serde_json::from_value::<JsonRpcId>(id_value)
                .map_err(|e| HostError::new(ErrorCode::InvalidRequest, format!("invalid id: {e}")))?,
        ),
    };

    let params = map.remove("params").unwrap_or(Value::Null);

    Ok(JsonRpcRequest { id, method, params })
}

/// A JSON-RPC 2.0 response body: either `result` or `error`, never both.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: JsonRpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    #[must_use]
    pub fn error(id: JsonRpcId, error: &HostError) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(error.to_rpc_error()) }
    }
}
