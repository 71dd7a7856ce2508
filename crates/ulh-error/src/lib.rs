// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-RPC error taxonomy for the Ultralight MCP host (spec §4.1, §7).
//!
//! Every admission or dispatch failure carries a stable [`ErrorCode`] that
//! maps 1:1 onto a JSON-RPC `code` and an HTTP status (spec §9's "cleaner
//! mapping", adopted here — see [`ErrorCode::http_status`]).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed JSON-RPC framing.
    ClientFraming,
    /// Bearer credential missing, expired, or invalid.
    Authentication,
    /// Token scope, visibility, or per-function constraint denial.
    Authorization,
    /// Rate limit or hosting-suspension admission cap.
    AdmissionCap,
    /// Code fetch or per-user secret resolution failure.
    Setup,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClientFraming => "client_framing",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::AdmissionCap => "admission_cap",
            Self::Setup => "setup",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Stable JSON-RPC error code (spec §4.1, §6 "Error codes").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Body did not parse as JSON.
    ParseError,
    /// Missing `jsonrpc` version or `method`.
    InvalidRequest,
    /// `method` is not one of the routed methods.
    MethodNotFound,
    /// `params` failed schema validation.
    InvalidParams,
    /// Unexpected internal failure.
    Internal,
    /// Rate limit exhausted.
    RateLimited,
    /// Bearer credential missing or invalid.
    AuthFailed,
    /// App not found, or found but the caller must not be told it exists.
    NotFoundOrSuspended,
    /// Token scope, visibility, or per-function constraint denied the call.
    PermissionDenied,
    /// A required per-user secret is missing.
    MissingSecrets,
}

impl ErrorCode {
    /// The wire-level JSON-RPC integer code (spec §6).
    #[must_use]
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
            Self::RateLimited => -32000,
            Self::AuthFailed => -32001,
            Self::NotFoundOrSuspended => -32002,
            Self::PermissionDenied => -32003,
            Self::MissingSecrets => -32006,
        }
    }

    /// The HTTP status this code is carried with (spec §9's resolved mapping).
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ParseError | Self::InvalidRequest | Self::InvalidParams => 400,
            Self::AuthFailed => 401,
            Self::PermissionDenied | Self::MissingSecrets => 403,
            Self::MethodNotFound | Self::NotFoundOrSuspended => 404,
            Self::RateLimited => 429,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ParseError | Self::InvalidRequest | Self::MethodNotFound | Self::InvalidParams => {
                ErrorCategory::ClientFraming
            }
            Self::AuthFailed => ErrorCategory::Authentication,
            Self::PermissionDenied => ErrorCategory::Authorization,
            Self::RateLimited | Self::NotFoundOrSuspended => ErrorCategory::AdmissionCap,
            Self::MissingSecrets => ErrorCategory::Setup,
            Self::Internal => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rpc_code())
    }
}

/// Subtype carried in `data.type` for [`ErrorCode::AuthFailed`] (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFailureKind {
    AuthRequired,
    AuthTokenExpired,
    AuthMissingToken,
    AuthInvalidToken,
    AuthApiTokenInvalid,
}

// ---------------------------------------------------------------------------
// HostError
// ---------------------------------------------------------------------------

/// Unified host error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// `data` payload forwarded verbatim to the JSON-RPC response, and an
/// optional underlying cause for logging.
///
/// # Builder usage
///
/// ```
/// use ulh_error::{HostError, ErrorCode};
///
/// let err = HostError::new(ErrorCode::RateLimited, "rate limit exceeded")
///     .with_data(serde_json::json!({"resetAt": "2026-07-28T00:01:00Z"}));
/// ```
pub struct HostError {
    pub code: ErrorCode,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HostError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Render as the `error` object of a JSON-RPC 2.0 response (spec §4.1).
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcErrorObject {
        RpcErrorObject {
            code: self.code.rpc_code(),
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }
}

impl fmt::Debug for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("data", &self.data)
            .finish()
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.rpc_code(), self.message)
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|b| b.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Wire representation of a JSON-RPC `error` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A serializable snapshot of a [`HostError`], for logging or cross-process
/// transport where the `source` chain cannot travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostErrorDto {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub source_message: Option<String>,
}

impl From<&HostError> for HostErrorDto {
    fn from(err: &HostError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            data: err.data.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

const ALL_CODES: &[ErrorCode] = &[
    ErrorCode::ParseError,
    ErrorCode::InvalidRequest,
    ErrorCode::MethodNotFound,
    ErrorCode::InvalidParams,
    ErrorCode::Internal,
    ErrorCode::RateLimited,
    ErrorCode::AuthFailed,
    ErrorCode::NotFoundOrSuspended,
    ErrorCode::PermissionDenied,
    ErrorCode::MissingSecrets,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    #[test]
    fn rpc_codes_match_spec() {
        assert_eq!(ErrorCode::ParseError.rpc_code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.rpc_code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.rpc_code(), -32601);
        assert_eq!(ErrorCode::RateLimited.rpc_code(), -32000);
        assert_eq!(ErrorCode::AuthFailed.rpc_code(), -32001);
        assert_eq!(ErrorCode::NotFoundOrSuspended.rpc_code(), -32002);
        assert_eq!(ErrorCode::PermissionDenied.rpc_code(), -32003);
        assert_eq!(ErrorCode::MissingSecrets.rpc_code(), -32006);
    }

    #[test]
    fn http_status_mapping_matches_resolved_open_question() {
        assert_eq!(ErrorCode::RateLimited.http_status(), 429);
        assert_eq!(ErrorCode::AuthFailed.http_status(), 401);
        assert_eq!(ErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorCode::MissingSecrets.http_status(), 403);
        assert_eq!(ErrorCode::NotFoundOrSuspended.http_status(), 404);
        assert_eq!(ErrorCode::MethodNotFound.http_status(), 404);
        assert_eq!(ErrorCode::ParseError.http_status(), 400);
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::InvalidParams.http_status(), 400);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
    }

    #[test]
    fn all_codes_have_unique_rpc_code() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.rpc_code()));
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn to_rpc_error_includes_data() {
        let err = HostError::new(ErrorCode::RateLimited, "too many calls")
            .with_data(serde_json::json!({"resetAt": "now"}));
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32000);
        assert_eq!(rpc.data.unwrap()["resetAt"], "now");
    }

    #[test]
    fn rpc_error_omits_data_when_absent() {
        let err = HostError::new(ErrorCode::Internal, "boom");
        let json = serde_json::to_string(&err.to_rpc_error()).unwrap();
        assert!(!json.contains("data"));
    }

    #[test]
    fn source_chain_preserved() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = HostError::new(ErrorCode::Internal, "setup failed").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "not found");
    }

    #[test]
    fn dto_roundtrip_without_source() {
        let err = HostError::new(ErrorCode::MissingSecrets, "need API_KEY");
        let dto: HostErrorDto = (&err).into();
        let json = serde_json::to_string(&dto).unwrap();
        let back: HostErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        assert!(back.source_message.is_none());
    }

    #[test]
    fn category_groups_as_expected() {
        assert_eq!(ErrorCode::AuthFailed.category(), ErrorCategory::Authentication);
        assert_eq!(ErrorCode::PermissionDenied.category(), ErrorCategory::Authorization);
        assert_eq!(ErrorCode::RateLimited.category(), ErrorCategory::AdmissionCap);
        assert_eq!(ErrorCode::MissingSecrets.category(), ErrorCategory::Setup);
    }

    #[test]
    fn auth_failure_kind_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&AuthFailureKind::AuthMissingToken).unwrap();
        assert_eq!(json, r#""AUTH_MISSING_TOKEN""#);
    }
}
