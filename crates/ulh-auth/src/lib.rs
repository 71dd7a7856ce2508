// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token Verifier (spec §4.2, C1): decides whether a bearer credential is a
//! platform JWT or a hashed API token, and resolves it to a [`VerifiedCaller`].
#![deny(unsafe_code)]

mod api_token;
mod jwt;

pub use api_token::{hash_token, TOKEN_PREFIX};

use chrono::{DateTime, Utc};
use tracing::warn;
use ulh_core::{Tier, TokenScope, VerifiedCaller};
use ulh_error::{AuthFailureKind, ErrorCode, HostError};
use ulh_repository::{ApiTokenRepository, UserRepository};

fn auth_error(kind: AuthFailureKind, message: impl Into<String>) -> HostError {
    HostError::new(ErrorCode::AuthFailed, message)
        .with_data(serde_json::json!({ "type": kind }))
}

/// Resolve the `Authorization` header value into a [`VerifiedCaller`].
///
/// `header` is the raw header value (e.g. `"Bearer ul_abc123"`); its absence
/// is itself an auth failure, not a caller error, since every routed MCP
/// method requires a caller.
pub async fn verify(
    header: Option<&str>,
    now: DateTime<Utc>,
    tokens: &dyn ApiTokenRepository,
    users: &dyn UserRepository,
) -> Result<VerifiedCaller, HostError> {
    let raw = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| auth_error(AuthFailureKind::AuthMissingToken, "missing bearer credential"))?;

    if let Some(token) = raw.strip_prefix(TOKEN_PREFIX) {
        verify_api_token(token, now, tokens, users).await
    } else {
        verify_jwt(raw, now, users).await
    }
}

async fn verify_api_token(
    token_without_prefix: &str,
    now: DateTime<Utc>,
    tokens: &dyn ApiTokenRepository,
    users: &dyn UserRepository,
) -> Result<VerifiedCaller, HostError> {
    let full_token = format!("{TOKEN_PREFIX}{token_without_prefix}");
    let token_hash = hash_token(&full_token);

    let record = tokens
        .find_by_hash(&token_hash)
        .await
        .map_err(|e| HostError::new(ErrorCode::Internal, "token lookup failed").with_source(e))?
        .ok_or_else(|| auth_error(AuthFailureKind::AuthApiTokenInvalid, "unknown API token"))?;

    if record.revoked {
        return Err(auth_error(AuthFailureKind::AuthApiTokenInvalid, "API token revoked"));
    }
    if let Some(expires_at) = record.expires_at {
        if now >= expires_at {
            return Err(auth_error(AuthFailureKind::AuthTokenExpired, "API token expired"));
        }
    }

    if let Err(e) = tokens.touch_last_used(&token_hash, now).await {
        warn!(error = %e, "best-effort last_used_at touch failed for API token");
    }

    let user = users
        .find_by_id(&record.user_id)
        .await
        .map_err(|e| HostError::new(ErrorCode::Internal, "user lookup failed").with_source(e))?
        .ok_or_else(|| auth_error(AuthFailureKind::AuthApiTokenInvalid, "token owner not found"))?;

    Ok(VerifiedCaller {
        user_id: user.id,
        email: user.email,
        tier: user.tier,
        scope: Some(TokenScope {
            app_ids: record.app_ids,
            function_names: record.function_names,
        }),
    })
}

async fn verify_jwt(
    token: &str,
    now: DateTime<Utc>,
    users: &dyn UserRepository,
) -> Result<VerifiedCaller, HostError> {
    let claims = jwt::decode_claims(token, now.timestamp_millis())?;

    if let Err(e) = users.ensure_exists(&claims.sub, &claims.email, Tier::Free).await {
        warn!(error = %e, user_id = %claims.sub, "best-effort user row creation failed");
    }

    let tier = match users.find_by_id(&claims.sub).await {
        Ok(Some(user)) => user.tier,
        Ok(None) => Tier::Free,
        Err(e) => {
            warn!(error = %e, user_id = %claims.sub, "user lookup failed, defaulting tier");
            Tier::Free
        }
    };

    Ok(VerifiedCaller {
        user_id: claims.sub,
        email: claims.email,
        tier,
        scope: None,
    })
}
