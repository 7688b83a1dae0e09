//! Client-side encryption for provider API keys.
//!
//! Keys typed into a strategy form never leave this process in plaintext. They are
//! sealed with AES-256-GCM under a key derived from the deployment's client secret via
//! PBKDF2-HMAC-SHA256, and stored in the strategy config as an opaque blob.
//!
//! Format: `enc:v1:` + base64([12-byte nonce][ciphertext+tag])

use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use thiserror::Error;

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};
const SALT: &[u8] = b"ragstudio-api-key-v1";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PREFIX: &str = "enc:v1:";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("No client secret configured. Run `ragstudio init` first.")]
    MissingSecret,
    #[error("Failed to create encryption key")]
    Key,
    #[error("Failed to generate nonce")]
    Nonce,
    #[error("Encryption failed")]
    Seal,
    #[error("Decryption failed, wrong client secret?")]
    Open,
    #[error("Malformed encrypted value")]
    Malformed,
}

fn derive_key(secret: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        SALT,
        secret.as_bytes(),
        &mut key,
    );
    key
}

fn sealing_key(secret: &str) -> Result<LessSafeKey, CryptoError> {
    let unbound = UnboundKey::new(&AES_256_GCM, &derive_key(secret)).map_err(|_| CryptoError::Key)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypts an API key with the client secret. Returns the serialized blob.
pub fn encrypt_api_key(plaintext: &str, client_secret: Option<&str>) -> Result<String, CryptoError> {
    let secret = client_secret
        .filter(|s| !s.is_empty())
        .ok_or(CryptoError::MissingSecret)?;
    let key = sealing_key(secret)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| CryptoError::Nonce)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Seal)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&in_out);
    Ok(format!(
        "{PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(&blob)
    ))
}

/// Opens a blob produced by [`encrypt_api_key`].
pub fn decrypt_api_key(blob: &str, client_secret: &str) -> Result<String, CryptoError> {
    let encoded = blob.strip_prefix(PREFIX).ok_or(CryptoError::Malformed)?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::Malformed)?;
    if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(CryptoError::Malformed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce_array: [u8; NONCE_LEN] = nonce_bytes.try_into().map_err(|_| CryptoError::Malformed)?;
    let nonce = Nonce::assume_unique_for_key(nonce_array);

    let key = sealing_key(client_secret)?;
    let mut in_out = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Open)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::Malformed)
}

/// Whether a stored config value is already an encrypted blob.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let blob = encrypt_api_key("sk-live-123", Some("deploy-secret")).unwrap();
        assert!(is_encrypted(&blob));
        assert!(!blob.contains("sk-live-123"));
        assert_eq!(decrypt_api_key(&blob, "deploy-secret").unwrap(), "sk-live-123");
    }

    #[test]
    fn test_wrong_secret_fails() {
        let blob = encrypt_api_key("sk-live-123", Some("right")).unwrap();
        assert!(matches!(decrypt_api_key(&blob, "wrong"), Err(CryptoError::Open)));
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        assert!(matches!(encrypt_api_key("k", None), Err(CryptoError::MissingSecret)));
        assert!(matches!(encrypt_api_key("k", Some("")), Err(CryptoError::MissingSecret)));
    }

    #[test]
    fn test_nonces_differ() {
        let a = encrypt_api_key("same", Some("s")).unwrap();
        let b = encrypt_api_key("same", Some("s")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_blob() {
        assert!(matches!(decrypt_api_key("plaintext", "s"), Err(CryptoError::Malformed)));
        assert!(matches!(decrypt_api_key("enc:v1:AAAA", "s"), Err(CryptoError::Malformed)));
    }
}
