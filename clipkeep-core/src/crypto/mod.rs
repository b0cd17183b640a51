//! Cryptographic primitives for the history vault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation (`normal` / `hard` cost modes)
//! - AES-256-GCM tokens rendered as URL-safe base64 text
//! - The versioned `v2:` envelope and the legacy raw-token format
//! - Key material resolution and batch re-encryption

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod rekey;

pub use cipher::{load_or_create_key_file, open_token, seal_token, TokenKey};
pub use envelope::{decrypt, encrypt, Envelope, EnvelopeFormat};
pub use kdf::{derive_key, generate_salt, DerivationMode};
pub use keys::KeyMaterial;
pub use rekey::{reencrypt_all, RekeyReport};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
