// SPDX-License-Identifier: MIT OR Apache-2.0
//! AES-GCM envelope encryption with a PBKDF2-derived key (spec §4.11
//! "Crypto Envelope"). Used for `env_vars` and per-user secrets.
//!
//! Wire format (v2): `base64(salt(16) || iv(12) || ciphertext)`. Legacy v1
//! blobs (`base64(iv(12) || ciphertext)`, fixed global salt) are still
//! decryptable; [`decrypt`] tries v2 first and falls back to v1 on
//! authentication failure. This dual path is permanent until a migration
//! epoch — do not bake the fallback into new call sites, only into
//! [`decrypt`] itself.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;
use thiserror::Error;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;
const LEGACY_SALT: &[u8] = b"ultralight-env-vars-salt";

/// Envelope format a blob was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    /// Per-record random salt, prefixed to the blob.
    V2,
    /// Legacy fixed global salt, no salt prefix.
    V1,
}

/// Errors from [`encrypt`] or [`decrypt`].
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("blob too short to contain a valid envelope")]
    Truncated,
    #[error("key derivation or cipher setup failed")]
    KeySetup,
    #[error("decryption failed under both v2 and v1 envelope formats")]
    AuthenticationFailed,
    #[error("ciphertext is not valid base64")]
    InvalidBase64,
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}

fn derive_key(master_key: &[u8], salt: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    let mut key_bytes = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(master_key, salt, PBKDF2_ROUNDS, &mut key_bytes);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    Ok(Aes256Gcm::new(key))
}

/// Encrypt `plaintext` under `master_key`, producing a v2 blob: a fresh
/// random 16-byte salt and 12-byte IV, PBKDF2-HMAC-SHA256 key derivation
/// (100,000 rounds, 256-bit output), then `base64(salt || iv || ciphertext)`.
pub fn encrypt(master_key: &[u8], plaintext: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = derive_key(master_key, &salt)?;
    let nonce = Nonce::from_slice(&iv);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::KeySetup)?;

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(B64.encode(out))
}

/// Decrypt a v2 or v1 blob, returning the plaintext and the format it was
/// recovered under.
pub fn decrypt(master_key: &[u8], blob: &str) -> Result<(String, EnvelopeVersion), CryptoError> {
    let raw = B64.decode(blob).map_err(|_| CryptoError::InvalidBase64)?;

    if let Ok(plaintext) = try_decrypt_v2(master_key, &raw) {
        return Ok((plaintext, EnvelopeVersion::V2));
    }
    if let Ok(plaintext) = try_decrypt_v1(master_key, &raw) {
        return Ok((plaintext, EnvelopeVersion::V1));
    }
    Err(CryptoError::AuthenticationFailed)
}

fn try_decrypt_v2(master_key: &[u8], raw: &[u8]) -> Result<String, CryptoError> {
    if raw.len() < SALT_LEN + IV_LEN {
        return Err(CryptoError::Truncated);
    }
    let (salt, rest) = raw.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let cipher = derive_key(master_key, salt)?;
    let nonce = Nonce::from_slice(iv);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

fn try_decrypt_v1(master_key: &[u8], raw: &[u8]) -> Result<String, CryptoError> {
    if raw.len() < IV_LEN {
        return Err(CryptoError::Truncated);
    }
    let (iv, ciphertext) = raw.split_at(IV_LEN);

    let cipher = derive_key(master_key, LEGACY_SALT)?;
    let nonce = Nonce::from_slice(iv);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

/// Encrypt `plaintext` under the legacy v1 format (fixed global salt, no
/// salt prefix). Only exists to produce fixtures exercising the v1 decrypt
/// fallback path; new code must always call [`encrypt`].
#[doc(hidden)]
pub fn encrypt_v1_for_tests(master_key: &[u8], plaintext: &str) -> Result<String, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let cipher = derive_key(master_key, LEGACY_SALT)?;
    let nonce = Nonce::from_slice(&iv);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::KeySetup)?;
    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(B64.encode(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"unit-test-master-key-not-for-prod";

    #[test]
    fn round_trip_v2() {
        let blob = encrypt(KEY, "sk-abc123").unwrap();
        let (plaintext, version) = decrypt(KEY, &blob).unwrap();
        assert_eq!(plaintext, "sk-abc123");
        assert_eq!(version, EnvelopeVersion::V2);
    }

    #[test]
    fn round_trip_v1_fallback() {
        let blob = encrypt_v1_for_tests(KEY, "legacy-secret").unwrap();
        let (plaintext, version) = decrypt(KEY, &blob).unwrap();
        assert_eq!(plaintext, "legacy-secret");
        assert_eq!(version, EnvelopeVersion::V1);
    }

    #[test]
    fn each_encryption_uses_a_fresh_salt_and_iv() {
        let a = encrypt(KEY, "same-plaintext").unwrap();
        let b = encrypt(KEY, "same-plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_master_key_fails_both_paths() {
        let blob = encrypt(KEY, "secret").unwrap();
        let err = decrypt(b"wrong-key", &blob).unwrap_err();
        assert!(matches!(err, CryptoError::AuthenticationFailed));
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let blob = encrypt(KEY, "").unwrap();
        let (plaintext, _) = decrypt(KEY, &blob).unwrap();
        assert_eq!(plaintext, "");
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let err = decrypt(KEY, &B64.encode([1, 2, 3])).unwrap_err();
        assert!(matches!(err, CryptoError::AuthenticationFailed));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = decrypt(KEY, "not base64!!").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidBase64));
    }

    #[test]
    fn unicode_plaintext_round_trips() {
        let blob = encrypt(KEY, "héllo wörld 🔑").unwrap();
        let (plaintext, _) = decrypt(KEY, &blob).unwrap();
        assert_eq!(plaintext, "héllo wörld 🔑");
    }
}
