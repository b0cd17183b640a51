//! Key material threaded into every encrypt/decrypt call.
//!
//! There is no process-wide key: callers build a [`KeyMaterial`] from
//! settings and pass it explicitly to the capture pipeline, the UI read
//! path and re-encryption.

use crate::config::Settings;
use crate::crypto::cipher::{load_or_create_key_file, TokenKey};
use crate::crypto::envelope::{self, EnvelopeFormat};
use crate::crypto::kdf::{derive_key, DerivationMode};
use crate::crypto::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use zeroize::Zeroizing;

/// How new captures are written
enum Writer {
    /// Encryption disabled: rows hold the raw UTF-8 text
    Plain,
    /// Version-1 tokens under the fixed key
    Legacy,
    /// Version-2 envelopes under a password-derived key
    Versioned {
        salt: Vec<u8>,
        mode: DerivationMode,
        key: TokenKey,
    },
}

/// Keys available to this process for reading and writing history rows
pub struct KeyMaterial {
    writer: Writer,
    fixed_key: Option<TokenKey>,
    password: Option<Zeroizing<String>>,
    derived: Mutex<HashMap<(DerivationMode, Vec<u8>), TokenKey>>,
}

impl KeyMaterial {
    /// Pass-through material for when encryption is disabled
    pub fn plaintext() -> Self {
        Self {
            writer: Writer::Plain,
            fixed_key: None,
            password: None,
            derived: Mutex::new(HashMap::new()),
        }
    }

    /// Legacy material: one fixed key, version-1 tokens
    pub fn fixed(key: TokenKey) -> Self {
        Self {
            writer: Writer::Legacy,
            fixed_key: Some(key),
            password: None,
            derived: Mutex::new(HashMap::new()),
        }
    }

    /// Personal password without a versioned salt yet.
    ///
    /// Writes version-1 tokens under the unsalted password digest and can
    /// still open version-2 envelopes sealed under the same password.
    pub fn password_only(password: &str) -> Self {
        Self {
            writer: Writer::Legacy,
            fixed_key: Some(TokenKey::from_password_digest(password)),
            password: Some(Zeroizing::new(password.to_string())),
            derived: Mutex::new(HashMap::new()),
        }
    }

    /// Personal password writing version-2 envelopes under `(salt, mode)`.
    ///
    /// Runs the key derivation once.
    pub fn personal(password: &str, salt: &[u8], mode: DerivationMode) -> Self {
        let key = derive_key(password, salt, mode);
        Self::personal_with_key(password, salt, mode, key)
    }

    /// Like [`KeyMaterial::personal`] with an already derived key.
    pub fn personal_with_key(password: &str, salt: &[u8], mode: DerivationMode, key: TokenKey) -> Self {
        let mut derived = HashMap::new();
        derived.insert((mode, salt.to_vec()), key.clone());

        Self {
            writer: Writer::Versioned {
                salt: salt.to_vec(),
                mode,
                key,
            },
            fixed_key: Some(TokenKey::from_password_digest(password)),
            password: Some(Zeroizing::new(password.to_string())),
            derived: Mutex::new(derived),
        }
    }

    /// Resolve key material from settings.
    ///
    /// - encryption disabled → [`KeyMaterial::plaintext`]
    /// - personal key with a configured salt → [`KeyMaterial::personal`]
    /// - personal key without salt → [`KeyMaterial::password_only`]
    /// - otherwise → fixed key loaded from (or created at) `key_file`
    pub fn from_settings(settings: &Settings, key_file: &Path) -> crate::Result<Self> {
        if !settings.encryption_enabled {
            return Ok(Self::plaintext());
        }

        if settings.use_personal_key && !settings.personal_key.is_empty() {
            return Ok(match settings.encryption_salt_bytes()? {
                Some(salt) => Self::personal(&settings.personal_key, &salt, settings.encryption_mode),
                None => Self::password_only(&settings.personal_key),
            });
        }

        Ok(Self::fixed(load_or_create_key_file(key_file)?))
    }

    /// Whether rows are stored without encryption
    pub fn is_plaintext(&self) -> bool {
        matches!(self.writer, Writer::Plain)
    }

    /// Fixed key for legacy tokens, if any
    pub fn fixed_key(&self) -> Option<&TokenKey> {
        self.fixed_key.as_ref()
    }

    /// Personal password, if any
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.as_str())
    }

    /// Envelope version used for new captures (0 when unencrypted)
    pub fn write_version(&self) -> u8 {
        match self.writer {
            Writer::Plain => 0,
            Writer::Legacy => 1,
            Writer::Versioned { .. } => 2,
        }
    }

    /// Encrypt plaintext for a new history row
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>> {
        match &self.writer {
            Writer::Plain => Ok(plaintext.as_bytes().to_vec()),
            Writer::Legacy => match &self.fixed_key {
                Some(key) => envelope::encrypt(plaintext, key, EnvelopeFormat::Legacy),
                None => Err(crate::crypto::CryptoError::EncryptionFailed(
                    "No fixed key available".to_string(),
                )),
            },
            Writer::Versioned { salt, mode, key } => envelope::encrypt(
                plaintext,
                key,
                EnvelopeFormat::Versioned { salt, mode: *mode },
            ),
        }
    }

    /// Decrypt a history row, returning `""` on failure.
    ///
    /// Derived keys are cached per `(mode, salt)` for the lifetime of this
    /// material, so a batch sharing one salt derives once.
    pub fn decrypt(&self, ciphertext: &[u8]) -> String {
        if self.is_plaintext() {
            return String::from_utf8_lossy(ciphertext).into_owned();
        }

        envelope::decrypt_with(ciphertext, self.fixed_key(), self.password(), |password, salt, mode| {
            let cache_key = (mode, salt.to_vec());
            if let Ok(cache) = self.derived.lock() {
                if let Some(key) = cache.get(&cache_key) {
                    return key.clone();
                }
            }

            let key = derive_key(password, salt, mode);
            if let Ok(mut cache) = self.derived.lock() {
                cache.insert(cache_key, key.clone());
            }
            key
        })
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("write_version", &self.write_version())
            .field("has_fixed_key", &self.fixed_key.is_some())
            .field("has_password", &self.password.is_some())
            .finish()
    }
}
