//! Database models for clipboard history rows.

use serde::{Deserialize, Serialize};

/// A clipboard snippet stored in the history or archive database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Store-assigned id, never reused within one database
    pub id: i64,
    /// Opaque envelope produced by the codec
    pub ciphertext: Vec<u8>,
    /// Zero-padded `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub is_code: bool,
    pub pinned: bool,
    pub favorite: bool,
}
