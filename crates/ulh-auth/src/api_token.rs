//! `ul_<opaque>` API token verification.

use sha2::{Digest, Sha256};

pub const TOKEN_PREFIX: &str = "ul_";

/// SHA-256 hex digest of the full token, as stored in [`ulh_core::ApiTokenRecord::token_hash`].
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
