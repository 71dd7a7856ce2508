//! Merged environment variable map exposed to sandboxed code (spec §4.7).

use std::collections::BTreeMap;

/// Merge decrypted universal env vars with per-user secrets; per-user
/// entries win on key collision.
#[must_use]
pub fn merge(universal: &BTreeMap<String, String>, per_user: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut merged = universal.clone();
    for (k, v) in per_user {
        merged.insert(k.clone(), v.clone());
    }
    merged
}
