//! Batch re-encryption after a password change.

use crate::crypto::envelope::{self, EnvelopeFormat};
use crate::crypto::kdf::{derive_key, generate_salt, DerivationMode};
use crate::crypto::keys::KeyMaterial;
use crate::database::Table;
use crate::history::{queries, HistoryStore};
use crate::{ClipkeepError, DatabaseError, Result};
use tracing::{info, warn};

/// Outcome of a re-encryption pass
#[derive(Debug)]
pub struct RekeyReport {
    /// Salt shared by every envelope written in this pass
    pub salt: Vec<u8>,
    pub mode: DerivationMode,
    pub reencrypted: Vec<i64>,
    /// Entries that did not decrypt under the old credential and were left as-is
    pub skipped: Vec<i64>,
    /// Material for the new password, with its key already derived
    pub keys: KeyMaterial,
}

/// Re-encrypt every history entry under `new_password`.
///
/// A fresh salt is generated and the new key derived once. Each entry is
/// opened with `old` (version auto-detected); only entries that yield
/// non-empty plaintext are rewritten as version-2 envelopes. Entries that
/// fail to open keep their original ciphertext and become unreadable once
/// the caller switches settings to the new salt.
///
/// The pass holds the history store lock throughout.
pub fn reencrypt_all(
    store: &HistoryStore,
    old: &KeyMaterial,
    new_password: &str,
    mode: DerivationMode,
) -> Result<RekeyReport> {
    if new_password.is_empty() {
        return Err(ClipkeepError::InvalidInput("New password must not be empty".to_string()));
    }

    let salt = generate_salt();
    let new_key = derive_key(new_password, &salt, mode);

    let (reencrypted, skipped) = store.with_connection(|conn| {
        let mut reencrypted = Vec::new();
        let mut skipped = Vec::new();

        for entry in queries::select_all(conn, Table::History, "id ASC").map_err(DatabaseError::Sqlite)? {
            let plaintext = old.decrypt(&entry.ciphertext);
            if plaintext.is_empty() {
                warn!("Entry {} did not decrypt with the old credential, leaving it unchanged", entry.id);
                skipped.push(entry.id);
                continue;
            }

            let blob = envelope::encrypt(&plaintext, &new_key, EnvelopeFormat::Versioned { salt: &salt, mode })?;
            queries::update_ciphertext(conn, entry.id, &blob).map_err(DatabaseError::Sqlite)?;
            reencrypted.push(entry.id);
        }

        Ok((reencrypted, skipped))
    })?;

    info!(
        "Re-encrypted {} entries ({} skipped) with mode {}",
        reencrypted.len(),
        skipped.len(),
        mode
    );

    let keys = KeyMaterial::personal_with_key(new_password, &salt, mode, new_key);

    Ok(RekeyReport {
        salt,
        mode,
        reencrypted,
        skipped,
        keys,
    })
}
