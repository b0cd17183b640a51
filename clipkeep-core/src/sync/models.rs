//! Snapshot wire format.

use crate::database::HistoryEntry;
use crate::{DatabaseError, Result};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One history entry in sync shape: everything but the local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Envelope ciphertext, carried verbatim
    pub text: String,
    pub timestamp: String,
    #[serde(with = "int_flag", default)]
    pub is_code: bool,
    #[serde(with = "int_flag", default)]
    pub pinned: bool,
    #[serde(with = "int_flag", default)]
    pub favorite: bool,
}

impl SyncRecord {
    /// Sync shape of `entry`, or `None` if its ciphertext isn't text
    pub fn from_entry(entry: &HistoryEntry) -> Option<Self> {
        let text = std::str::from_utf8(&entry.ciphertext).ok()?;
        Some(Self {
            text: text.to_string(),
            timestamp: entry.timestamp.clone(),
            is_code: entry.is_code,
            pinned: entry.pinned,
            favorite: entry.favorite,
        })
    }
}

/// Point-in-time export of the history store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncSnapshot {
    pub records: Vec<SyncRecord>,
}

impl SyncSnapshot {
    pub fn new(records: Vec<SyncRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DatabaseError::Serialization(e.to_string()).into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| DatabaseError::Serialization(e.to_string()).into())
    }
}

/// Flags travel as `0|1`; booleans are accepted on input.
mod int_flag {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
        deserializer.deserialize_any(FlagVisitor)
    }

    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("0, 1, true or false")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(Unexpected::Unsigned(v), &self)),
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(Unexpected::Signed(v), &self)),
            }
        }
    }
}
