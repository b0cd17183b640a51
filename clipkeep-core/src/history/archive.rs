//! Append-only archive for entries evicted by the retention policy.

use crate::database::{Database, HistoryEntry, Table};
use crate::history::queries;
use crate::{ClipkeepError, DatabaseError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Append-only sink with the same row shape as the history store.
///
/// Its ids are a separate id space from the history store.
#[derive(Clone)]
pub struct ArchiveStore {
    db: Arc<Mutex<Database>>,
}

impl ArchiveStore {
    pub fn new(db: Database) -> Result<Self> {
        db.initialize_schema(Table::Archive)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Database::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Database::in_memory()?)
    }

    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|_| ClipkeepError::from(DatabaseError::LockPoisoned("archive store".to_string())))?;
        Ok(f(db.conn()).map_err(DatabaseError::Sqlite)?)
    }

    /// Copy every field except the id; returns the archive id
    pub fn append(&self, entry: &HistoryEntry) -> Result<i64> {
        self.with_connection(|conn| {
            queries::insert(
                conn,
                Table::Archive,
                &entry.ciphertext,
                &entry.timestamp,
                entry.is_code,
                entry.pinned,
                entry.favorite,
            )
        })
    }

    /// Archived entries, newest first
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| queries::select_all(conn, Table::Archive, "id DESC"))
    }

    pub fn count(&self) -> Result<usize> {
        self.with_connection(|conn| queries::count(conn, Table::Archive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_copies_all_fields() {
        let archive = ArchiveStore::in_memory().unwrap();
        let entry = HistoryEntry {
            id: 77,
            ciphertext: b"blob".to_vec(),
            timestamp: "2023-05-05 10:00:00".to_string(),
            is_code: true,
            pinned: true,
            favorite: true,
        };

        let archive_id = archive.append(&entry).unwrap();
        let stored = &archive.list().unwrap()[0];
        assert_eq!(stored.id, archive_id);
        assert_eq!(stored.ciphertext, entry.ciphertext);
        assert_eq!(stored.timestamp, entry.timestamp);
        assert!(stored.is_code && stored.pinned && stored.favorite);
        assert_eq!(archive.count().unwrap(), 1);
    }
}
