//! AES-256-GCM tokens for clipboard snippets.
//!
//! A token is the text `base64url(nonce(12) || ciphertext || auth_tag(16))`.
//! Keys travel in their URL-safe base64 form (44 chars) so that key files,
//! derived keys and password digests all share one representation.

use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, Zeroizing};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A symmetric key accepted by the token cipher
#[derive(Clone)]
pub struct TokenKey {
    key: [u8; 32],
}

impl TokenKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self { key: key.into() }
    }

    /// Create a key from raw bytes
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Parse the URL-safe base64 form of a key
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            URL_SAFE
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Ok(Self { key })
    }

    /// Unsalted key derived from a personal password.
    ///
    /// Entries captured in personal-key mode before any versioned salt
    /// existed were sealed under this digest.
    pub fn from_password_digest(password: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(password.as_bytes()).into();
        Self { key: digest }
    }

    /// URL-safe base64 form of the key
    pub fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(self.key))
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl Drop for TokenKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenKey(..)")
    }
}

/// Seal plaintext into a token
///
/// # Security Notes
/// - A fresh random nonce is generated for every token
/// - AES-256-GCM provides both confidentiality and authenticity
pub fn seal_token(key: &TokenKey, plaintext: &[u8]) -> Result<String> {
    if plaintext.is_empty() {
        return Err(CryptoError::EncryptionFailed(
            "Cannot encrypt empty data".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // aes-gcm appends the tag, so this is ciphertext || tag
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    let mut raw = Vec::with_capacity(NONCE_LEN + sealed.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&sealed);

    Ok(URL_SAFE.encode(raw))
}

/// Open a token and verify its authentication tag
pub fn open_token(key: &TokenKey, token: &str) -> Result<Vec<u8>> {
    let raw = URL_SAFE
        .decode(token.as_bytes())
        .map_err(|e| CryptoError::DecryptionFailed(format!("Malformed token: {}", e)))?;

    // Minimum: nonce + 1 byte of ciphertext + tag
    if raw.len() < NONCE_LEN + 1 + TAG_LEN {
        return Err(CryptoError::DecryptionFailed("Token too short".to_string()));
    }

    let nonce_bytes: [u8; NONCE_LEN] = raw[..NONCE_LEN]
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed("Invalid nonce length".to_string()))?;
    let nonce = Nonce::from(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(&nonce, &raw[NONCE_LEN..])
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Load the fixed legacy key from `path`, creating it on first use.
pub fn load_or_create_key_file(path: &Path) -> Result<TokenKey> {
    if path.exists() {
        let encoded = Zeroizing::new(std::fs::read_to_string(path)?);
        return TokenKey::from_encoded(&encoded);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let key = TokenKey::generate();
    std::fs::write(path, key.encode().as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!("Generated new key file at {:?}", path);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = TokenKey::generate();
        let token = seal_token(&key, b"clipboard text").unwrap();
        assert_eq!(open_token(&key, &token).unwrap(), b"clipboard text");
    }

    #[test]
    fn test_tokens_are_ascii_without_colons() {
        let key = TokenKey::generate();
        let token = seal_token(&key, "naïve ✓".as_bytes()).unwrap();
        assert!(token.is_ascii());
        assert!(!token.contains(':'));
    }

    #[test]
    fn test_different_nonces() {
        let key = TokenKey::generate();
        let t1 = seal_token(&key, b"same").unwrap();
        let t2 = seal_token(&key, b"same").unwrap();
        assert_ne!(t1, t2);
        assert_eq!(open_token(&key, &t1).unwrap(), open_token(&key, &t2).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = seal_token(&TokenKey::generate(), b"secret").unwrap();
        assert!(matches!(
            open_token(&TokenKey::generate(), &token),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_empty_data_fails() {
        let key = TokenKey::generate();
        assert!(seal_token(&key, b"").is_err());
        assert!(open_token(&key, "").is_err());
        assert!(open_token(&key, "not base64 !!").is_err());
    }

    #[test]
    fn test_encoded_key_roundtrip() {
        let key = TokenKey::generate();
        let parsed = TokenKey::from_encoded(&key.encode()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());

        assert!(matches!(
            TokenKey::from_encoded(&URL_SAFE.encode([1u8; 16])),
            Err(CryptoError::InvalidKeyLength { expected: 32, got: 16 })
        ));
    }

    #[test]
    fn test_password_digest_is_stable() {
        let a = TokenKey::from_password_digest("hunter2");
        let b = TokenKey::from_password_digest("hunter2");
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), TokenKey::from_password_digest("hunter3").as_bytes());
    }

    #[test]
    fn test_key_file_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("clipkeep.key");

        let first = load_or_create_key_file(&path).unwrap();
        assert!(path.exists());
        let second = load_or_create_key_file(&path).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }
}
