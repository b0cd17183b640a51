//! Clipkeep Core Library
//!
//! This library provides the core functionality for the clipboard history
//! vault: the versioned envelope codec, the history and archive stores, the
//! retention engine and the snapshot sync engine.

pub mod capture;
pub mod config;
pub mod crypto;
pub mod database;
pub mod history;
pub mod platform;
pub mod retention;
pub mod sync;
pub mod timestamp;

pub use capture::{
    is_code, CaptureOutcome, CapturePipeline, ClipboardMatcher, ClipboardTransform, PatternRule,
    PrefixTransform,
};
pub use config::Settings;
pub use crypto::{
    derive_key, generate_salt, reencrypt_all, CryptoError, DerivationMode, Envelope, KeyMaterial,
    RekeyReport, TokenKey,
};
pub use database::{Database, HistoryEntry};
pub use history::{ArchiveStore, HistorySearch, HistoryStore};
pub use platform::{ensure_data_dir, get_config_dir, get_data_dir};
pub use retention::{RetentionEngine, RetentionMode, RetentionPolicy, RetentionReport};
pub use sync::{RemoteError, RemoteStorage, SyncEngine, SyncRecord, SyncReport, SyncSnapshot};

use thiserror::Error;

/// Result type for clipkeep operations
pub type Result<T> = std::result::Result<T, ClipkeepError>;

/// Errors raised by the persistence layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: i32, found: i32 },
}

/// General error type for clipkeep operations
#[derive(Error, Debug)]
pub enum ClipkeepError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote storage error: {0}")]
    Remote(#[from] sync::RemoteError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ClipkeepError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}
