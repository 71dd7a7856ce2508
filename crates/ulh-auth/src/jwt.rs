//! Decoding (not verifying the signature of) platform JWTs.
//!
//! The signature is assumed verified upstream by the identity provider that
//! issued the bearer token; this module only decodes the payload and checks
//! expiry and shape.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE as B64_URL;
use serde::Deserialize;
use ulh_error::{ErrorCode, HostError};

#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub email: String,
    /// Unix seconds.
    pub exp: i64,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Base64url-decode `segment`, repairing missing `=` padding first.
fn decode_segment(segment: &str) -> Result<Vec<u8>, HostError> {
    let mut padded = segment.to_string();
    let rem = padded.len() % 4;
    if rem != 0 {
        padded.push_str(&"=".repeat(4 - rem));
    }
    B64_URL
        .decode(padded.as_bytes())
        .map_err(|_| HostError::new(ErrorCode::AuthFailed, "malformed JWT payload"))
}

/// Decode and shape-check a bearer JWT, without verifying its signature.
///
/// Rejects tokens that don't have exactly three dot-separated segments, that
/// are expired as of `now_ms`, or that are missing `sub`/`email`.
pub fn decode_claims(token: &str, now_ms: i64) -> Result<JwtClaims, HostError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(HostError::new(ErrorCode::AuthFailed, "JWT must have three segments"));
    }

    let payload_bytes = decode_segment(segments[1])?;
    let claims: JwtClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|_| HostError::new(ErrorCode::AuthFailed, "JWT payload is not valid JSON"))?;

    if claims.sub.is_empty() || claims.email.is_empty() {
        return Err(HostError::new(ErrorCode::AuthFailed, "JWT is missing sub or email"));
    }
    if claims.exp.saturating_mul(1000) < now_ms {
        return Err(HostError::new(ErrorCode::AuthFailed, "JWT has expired"));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_segment(json: &serde_json::Value) -> String {
        B64_URL.encode(serde_json::to_vec(json).unwrap())
    }

    fn make_token(claims: &serde_json::Value) -> String {
        format!("header.{}.signature", encode_segment(claims))
    }

    #[test]
    fn decodes_valid_claims() {
        let token = make_token(&serde_json::json!({
            "sub": "user-1", "email": "a@example.com", "exp": 9_999_999_999i64
        }));
        let claims = decode_claims(&token, 1_000).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let err = decode_claims("only.two", 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthFailed);
    }

    #[test]
    fn rejects_expired_token() {
        let token = make_token(&serde_json::json!({
            "sub": "user-1", "email": "a@example.com", "exp": 100i64
        }));
        let err = decode_claims(&token, 200_000).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthFailed);
    }

    #[test]
    fn rejects_missing_email() {
        let token = make_token(&serde_json::json!({
            "sub": "user-1", "email": "", "exp": 9_999_999_999i64
        }));
        assert!(decode_claims(&token, 0).is_err());
    }

    #[test]
    fn tolerates_missing_padding() {
        // "sub":"u" with a length that base64 would otherwise pad.
        let claims = serde_json::json!({"sub": "u", "email": "u@e.co", "exp": 9_999_999_999i64});
        let mut encoded = encode_segment(&claims);
        while encoded.ends_with('=') {
            encoded.pop();
        }
        let token = format!("header.{encoded}.signature");
        let decoded = decode_claims(&token, 0).unwrap();
        assert_eq!(decoded.sub, "u");
    }
}
