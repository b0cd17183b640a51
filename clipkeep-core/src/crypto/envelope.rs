//! Versioned ciphertext envelopes.
//!
//! Two textual formats are stored in history rows:
//! - version 1 (legacy): the raw token, no prefix, opened with a fixed key
//! - version 2: `v2:<mode>:<base64(salt)>:<token>`, opened with a password
//!
//! Decryption never raises: any failure yields the empty string.

use crate::crypto::cipher::{open_token, seal_token, TokenKey};
use crate::crypto::kdf::{derive_key, DerivationMode};
use crate::crypto::{CryptoError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const V2_PREFIX: &str = "v2:";

/// Decoded view of a stored ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<'a> {
    /// Raw token sealed under an externally supplied key
    Legacy { token: &'a str },
    /// Self-describing token sealed under a password-derived key
    Versioned {
        mode: DerivationMode,
        salt: Vec<u8>,
        token: &'a str,
    },
}

impl<'a> Envelope<'a> {
    /// Parse a stored ciphertext.
    ///
    /// The body is split on `:` into at most 4 fields, so a token
    /// containing `:` stays intact.
    pub fn parse(blob: &'a [u8]) -> Result<Self> {
        let text = std::str::from_utf8(blob)
            .map_err(|_| CryptoError::MalformedEnvelope("not valid UTF-8".to_string()))?;

        if !text.starts_with(V2_PREFIX) {
            return Ok(Self::Legacy { token: text });
        }

        let mut parts = text.splitn(4, ':');
        parts.next();
        let mode = parts
            .next()
            .and_then(DerivationMode::parse)
            .ok_or_else(|| CryptoError::MalformedEnvelope("unknown mode".to_string()))?;
        let salt_b64 = parts
            .next()
            .ok_or_else(|| CryptoError::MalformedEnvelope("missing salt".to_string()))?;
        let token = parts
            .next()
            .ok_or_else(|| CryptoError::MalformedEnvelope("missing token".to_string()))?;
        let salt = STANDARD
            .decode(salt_b64)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("bad salt: {}", e)))?;

        Ok(Self::Versioned { mode, salt, token })
    }

    /// Envelope version number (1 or 2)
    pub fn version(&self) -> u8 {
        match self {
            Self::Legacy { .. } => 1,
            Self::Versioned { .. } => 2,
        }
    }
}

/// Output format requested from [`encrypt`]
#[derive(Debug, Clone, Copy)]
pub enum EnvelopeFormat<'a> {
    Legacy,
    Versioned { salt: &'a [u8], mode: DerivationMode },
}

/// Encrypt plaintext under `key` in the requested envelope format.
pub fn encrypt(plaintext: &str, key: &TokenKey, format: EnvelopeFormat<'_>) -> Result<Vec<u8>> {
    let token = seal_token(key, plaintext.as_bytes())?;

    let blob = match format {
        EnvelopeFormat::Legacy => token,
        EnvelopeFormat::Versioned { salt, mode } => {
            format!("{}{}:{}:{}", V2_PREFIX, mode, STANDARD.encode(salt), token)
        }
    };

    Ok(blob.into_bytes())
}

/// Decrypt a stored ciphertext, auto-detecting its version.
///
/// Version-2 envelopes need `password`; legacy tokens need `fixed_key`.
/// Returns `""` on any failure, which callers cannot tell apart from an
/// empty plaintext.
pub fn decrypt(ciphertext: &[u8], fixed_key: Option<&TokenKey>, password: Option<&str>) -> String {
    decrypt_with(ciphertext, fixed_key, password, derive_key)
}

/// [`decrypt`] with a caller-supplied key derivation (used for caching).
pub(crate) fn decrypt_with<F>(
    ciphertext: &[u8],
    fixed_key: Option<&TokenKey>,
    password: Option<&str>,
    derive: F,
) -> String
where
    F: FnOnce(&str, &[u8], DerivationMode) -> TokenKey,
{
    match try_decrypt(ciphertext, fixed_key, password, derive) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            tracing::debug!("Decryption failed: {}", e);
            String::new()
        }
    }
}

fn try_decrypt<F>(
    ciphertext: &[u8],
    fixed_key: Option<&TokenKey>,
    password: Option<&str>,
    derive: F,
) -> Result<String>
where
    F: FnOnce(&str, &[u8], DerivationMode) -> TokenKey,
{
    let plaintext = match Envelope::parse(ciphertext)? {
        Envelope::Versioned { mode, salt, token } => {
            let password = password.ok_or_else(|| {
                CryptoError::DecryptionFailed("Password required for v2 decryption".to_string())
            })?;
            let key = derive(password, &salt, mode);
            open_token(&key, token)?
        }
        Envelope::Legacy { token } => {
            let key = fixed_key.ok_or_else(|| {
                CryptoError::DecryptionFailed("No fixed key for legacy token".to_string())
            })?;
            open_token(key, token)?
        }
    };

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"0123456789abcdef";

    #[test]
    fn test_v2_roundtrip_with_password() {
        let key = derive_key("pw", SALT, DerivationMode::Normal);
        let blob = encrypt(
            "let x = 1;",
            &key,
            EnvelopeFormat::Versioned {
                salt: SALT,
                mode: DerivationMode::Normal,
            },
        )
        .unwrap();

        let text = std::str::from_utf8(&blob).unwrap();
        assert!(text.starts_with("v2:normal:MDEyMzQ1Njc4OWFiY2RlZg==:"));
        assert_eq!(decrypt(&blob, None, Some("pw")), "let x = 1;");
    }

    #[test]
    fn test_v2_without_password_is_sentinel() {
        let key = TokenKey::generate();
        let blob = encrypt(
            "secret",
            &key,
            EnvelopeFormat::Versioned {
                salt: SALT,
                mode: DerivationMode::Hard,
            },
        )
        .unwrap();
        assert_eq!(decrypt(&blob, Some(&key), None), "");
    }

    #[test]
    fn test_legacy_fixed_key_path() {
        let key = TokenKey::generate();
        let blob = encrypt("legacy text", &key, EnvelopeFormat::Legacy).unwrap();

        assert!(!blob.starts_with(V2_PREFIX.as_bytes()));
        assert_eq!(decrypt(&blob, Some(&key), None), "legacy text");
        // A legacy blob must not be misparsed as versioned
        assert_eq!(decrypt(&blob, None, Some("pw")), "");
    }

    #[test]
    fn test_parse_versions() {
        assert_eq!(Envelope::parse(b"abc").unwrap(), Envelope::Legacy { token: "abc" });

        let parsed = Envelope::parse(b"v2:hard:AAEC:tok:en").unwrap();
        assert_eq!(parsed.version(), 2);
        assert_eq!(
            parsed,
            Envelope::Versioned {
                mode: DerivationMode::Hard,
                salt: vec![0, 1, 2],
                token: "tok:en",
            }
        );
    }

    #[test]
    fn test_malformed_prefixes() {
        assert!(Envelope::parse(b"v2:").is_err());
        assert!(Envelope::parse(b"v2:normal").is_err());
        assert!(Envelope::parse(b"v2:normal:AAEC").is_err());
        assert!(Envelope::parse(b"v2:turbo:AAEC:token").is_err());
        assert!(Envelope::parse(b"v2:normal:***:token").is_err());
        assert!(Envelope::parse(&[0xff, 0xfe]).is_err());

        assert_eq!(decrypt(b"v2:normal", None, Some("pw")), "");
    }

    #[test]
    fn test_tampered_token_is_sentinel() {
        let key = TokenKey::generate();
        let blob = encrypt(
            "tamper me",
            &key,
            EnvelopeFormat::Versioned {
                salt: SALT,
                mode: DerivationMode::Normal,
            },
        )
        .unwrap();

        let token_start = blob.iter().rposition(|b| *b == b':').unwrap() + 1;
        for i in token_start..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            let out = decrypt_with(&tampered, None, Some("pw"), |_, _, _| key.clone());
            assert_eq!(out, "", "byte {} flipped", i);
        }

        let out = decrypt_with(&blob, None, Some("pw"), |_, _, _| key.clone());
        assert_eq!(out, "tamper me");
    }
}
