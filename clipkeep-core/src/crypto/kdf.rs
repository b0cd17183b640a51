//! PBKDF2-HMAC-SHA256 key derivation for personal passwords.
//!
//! Two cost modes are supported:
//! - `normal`: 200,000 iterations
//! - `hard`: 600,000 iterations
//!
//! Output is always 32 bytes, wrapped as a [`TokenKey`].

use crate::crypto::cipher::TokenKey;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

pub const PBKDF2_ITERATIONS_NORMAL: u32 = 200_000;
pub const PBKDF2_ITERATIONS_HARD: u32 = 600_000;

/// Salt length in bytes for versioned envelopes.
pub const SALT_LEN: usize = 16;

/// Key-derivation cost selected for a versioned envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationMode {
    #[default]
    Normal,
    Hard,
}

impl DerivationMode {
    /// Number of PBKDF2 rounds for this mode.
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Normal => PBKDF2_ITERATIONS_NORMAL,
            Self::Hard => PBKDF2_ITERATIONS_HARD,
        }
    }

    /// Convert the mode to the string carried inside envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }

    /// Parse a mode from its envelope representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for DerivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown derivation mode '{}'", s))
    }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> Vec<u8> {
    let salt: [u8; SALT_LEN] = rand::random();
    salt.to_vec()
}

/// Derive a token key from a password.
///
/// # Arguments
/// * `password` - The personal password
/// * `salt` - Raw salt bytes (shared by one re-encryption batch)
/// * `mode` - Cost mode selecting the iteration count
///
/// # Returns
/// A 32-byte key in the form the token cipher accepts
pub fn derive_key(password: &str, salt: &[u8], mode: DerivationMode) -> TokenKey {
    let mut output = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, mode.iterations(), &mut output[..]);
    TokenKey::from_bytes(*output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_iterations() {
        assert_eq!(DerivationMode::Normal.iterations(), 200_000);
        assert_eq!(DerivationMode::Hard.iterations(), 600_000);
        assert_eq!(DerivationMode::default(), DerivationMode::Normal);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(DerivationMode::parse("normal"), Some(DerivationMode::Normal));
        assert_eq!(DerivationMode::parse("hard"), Some(DerivationMode::Hard));
        assert_eq!(DerivationMode::parse("HARD"), None);
        assert!("extreme".parse::<DerivationMode>().is_err());
        assert_eq!(DerivationMode::Hard.to_string(), "hard");
    }

    #[test]
    fn test_salt_generation() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = generate_salt();
        let key1 = derive_key("correct horse", &salt, DerivationMode::Normal);
        let key2 = derive_key("correct horse", &salt, DerivationMode::Normal);
        assert_eq!(key1.as_bytes(), key2.as_bytes());

        // Different password should produce different key
        let key3 = derive_key("battery staple", &salt, DerivationMode::Normal);
        assert_ne!(key1.as_bytes(), key3.as_bytes());
    }

    #[test]
    fn test_mode_changes_key() {
        let salt = generate_salt();
        let normal = derive_key("pw", &salt, DerivationMode::Normal);
        let hard = derive_key("pw", &salt, DerivationMode::Hard);
        assert_ne!(normal.as_bytes(), hard.as_bytes());
    }

    #[test]
    fn test_encoded_key_form() {
        let key = derive_key("pw", b"0123456789abcdef", DerivationMode::Normal);
        // 32 bytes of URL-safe base64 with padding
        assert_eq!(key.encode().len(), 44);
    }
}
