//! History and archive stores.
//!
//! Both stores share one row layout and wrap a [`Database`] behind
//! `Arc<Mutex<_>>`. Every mutation takes the lock, so a store instance has a
//! single active writer at a time.

mod archive;
pub(crate) mod queries;
mod search;

pub use archive::ArchiveStore;
pub use search::{EntryKind, HistorySearch};

use crate::database::{Database, HistoryEntry, Table};
use crate::{ClipkeepError, DatabaseError, Result};
use queries::Flag;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Display order: pinned entries first, newest first within each group
const DISPLAY_ORDER: &str = "pinned DESC, id DESC";

/// Ordered, mutable collection of clipboard snippets
#[derive(Clone)]
pub struct HistoryStore {
    db: Arc<Mutex<Database>>,
}

impl HistoryStore {
    /// Wrap a database, creating the history schema if needed
    pub fn new(db: Database) -> Result<Self> {
        db.initialize_schema(Table::History)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open the history database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Database::open(path)?)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> Result<Self> {
        Self::new(Database::in_memory()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| ClipkeepError::from(DatabaseError::LockPoisoned("history store".to_string())))
    }

    /// Run `f` while holding the store lock.
    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.lock()?;
        f(db.conn())
    }

    /// Run `f` inside one SQLite transaction while holding the store lock.
    ///
    /// The transaction commits only if `f` returns `Ok`.
    pub(crate) fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut db = self.lock()?;
        let tx = db.conn_mut().transaction().map_err(DatabaseError::Sqlite)?;
        let value = f(&tx)?;
        tx.commit().map_err(DatabaseError::Sqlite)?;
        Ok(value)
    }

    /// Insert a new entry, unpinned and not a favorite; returns its id
    pub fn append(&self, ciphertext: &[u8], timestamp: &str, is_code: bool) -> Result<i64> {
        self.with_connection(|conn| {
            let id = queries::insert(conn, Table::History, ciphertext, timestamp, is_code, false, false)
                .map_err(DatabaseError::Sqlite)?;
            tracing::debug!("Appended history entry {}", id);
            Ok(id)
        })
    }

    /// All entries in display order (no pagination)
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| {
            Ok(queries::select_all(conn, Table::History, DISPLAY_ORDER).map_err(DatabaseError::Sqlite)?)
        })
    }

    /// Favorite entries in display order
    pub fn list_favorites(&self) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| {
            Ok(queries::select_where(conn, Table::History, "favorite = 1", DISPLAY_ORDER)
                .map_err(DatabaseError::Sqlite)?)
        })
    }

    /// Get an entry by id
    pub fn get(&self, id: i64) -> Result<HistoryEntry> {
        self.with_connection(|conn| {
            queries::select_one(conn, Table::History, id)
                .map_err(DatabaseError::Sqlite)?
                .ok_or_else(|| not_found(id))
        })
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<usize> {
        self.with_connection(|conn| Ok(queries::count(conn, Table::History).map_err(DatabaseError::Sqlite)?))
    }

    pub fn set_pinned(&self, id: i64, value: bool) -> Result<()> {
        self.set_flag(Flag::Pinned, id, value)
    }

    pub fn set_favorite(&self, id: i64, value: bool) -> Result<()> {
        self.set_flag(Flag::Favorite, id, value)
    }

    /// Flip the pinned flag; returns the new value
    pub fn toggle_pinned(&self, id: i64) -> Result<bool> {
        self.toggle_flag(Flag::Pinned, id)
    }

    /// Flip the favorite flag; returns the new value
    pub fn toggle_favorite(&self, id: i64) -> Result<bool> {
        self.toggle_flag(Flag::Favorite, id)
    }

    fn set_flag(&self, flag: Flag, id: i64, value: bool) -> Result<()> {
        self.with_connection(|conn| {
            let matched = queries::update_flag(conn, flag, id, value).map_err(DatabaseError::Sqlite)?;
            if matched == 0 {
                return Err(not_found(id));
            }
            Ok(())
        })
    }

    fn toggle_flag(&self, flag: Flag, id: i64) -> Result<bool> {
        self.with_connection(|conn| {
            let entry = queries::select_one(conn, Table::History, id)
                .map_err(DatabaseError::Sqlite)?
                .ok_or_else(|| not_found(id))?;
            let value = match flag {
                Flag::Pinned => !entry.pinned,
                Flag::Favorite => !entry.favorite,
            };
            queries::update_flag(conn, flag, id, value).map_err(DatabaseError::Sqlite)?;
            Ok(value)
        })
    }

    /// Delete every entry whose timestamp sorts before `cutoff`
    pub fn delete_older_than(&self, cutoff: &str) -> Result<usize> {
        self.with_connection(|conn| {
            Ok(queries::delete_older_than(conn, cutoff).map_err(DatabaseError::Sqlite)?)
        })
    }

    pub fn delete_by_id(&self, id: i64) -> Result<()> {
        self.with_connection(|conn| {
            let deleted = queries::delete_by_id(conn, id).map_err(DatabaseError::Sqlite)?;
            if deleted == 0 {
                return Err(not_found(id));
            }
            Ok(())
        })
    }

    /// Replace an entry's ciphertext, leaving every other field untouched
    pub fn replace_ciphertext(&self, id: i64, ciphertext: &[u8]) -> Result<()> {
        self.with_connection(|conn| {
            let updated = queries::update_ciphertext(conn, id, ciphertext).map_err(DatabaseError::Sqlite)?;
            if updated == 0 {
                return Err(not_found(id));
            }
            Ok(())
        })
    }
}

pub(crate) fn not_found(id: i64) -> ClipkeepError {
    ClipkeepError::NotFound(format!("History entry {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(entries: &[(&str, bool)]) -> (HistoryStore, Vec<i64>) {
        let store = HistoryStore::in_memory().unwrap();
        let ids = entries
            .iter()
            .map(|(ts, code)| store.append(ts.as_bytes(), ts, *code).unwrap())
            .collect();
        (store, ids)
    }

    #[test]
    fn test_append_and_get() {
        let store = HistoryStore::in_memory().unwrap();
        let id = store.append(b"cipher", "2024-01-01 00:00:00", true).unwrap();

        let entry = store.get(id).unwrap();
        assert_eq!(
            entry,
            HistoryEntry {
                id,
                ciphertext: b"cipher".to_vec(),
                timestamp: "2024-01-01 00:00:00".to_string(),
                is_code: true,
                pinned: false,
                favorite: false,
            }
        );
    }

    #[test]
    fn test_ids_strictly_increase_and_are_not_reused() {
        let (store, ids) = store_with(&[("2024-01-01 00:00:00", false), ("2024-01-01 00:00:01", false)]);
        assert!(ids[1] > ids[0]);

        store.delete_by_id(ids[1]).unwrap();
        let next = store.append(b"x", "2024-01-01 00:00:02", false).unwrap();
        assert!(next > ids[1]);
    }

    #[test]
    fn test_list_order_pinned_then_newest() {
        let (store, ids) = store_with(&[
            ("2024-01-01 00:00:00", false),
            ("2024-01-02 00:00:00", false),
            ("2024-01-03 00:00:00", false),
            ("2024-01-04 00:00:00", false),
        ]);
        store.set_pinned(ids[0], true).unwrap();
        store.set_pinned(ids[2], true).unwrap();

        let order: Vec<i64> = store.list().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[3], ids[1]]);
    }

    #[test]
    fn test_flags_and_not_found() {
        let (store, ids) = store_with(&[("2024-01-01 00:00:00", false)]);

        store.set_favorite(ids[0], true).unwrap();
        // Setting the same value again is not an error
        store.set_favorite(ids[0], true).unwrap();
        assert!(store.get(ids[0]).unwrap().favorite);
        assert_eq!(store.list_favorites().unwrap().len(), 1);

        assert!(store.toggle_pinned(ids[0]).unwrap());
        assert!(!store.toggle_pinned(ids[0]).unwrap());
        assert!(!store.toggle_favorite(ids[0]).unwrap());

        assert!(matches!(store.set_pinned(999, true), Err(ClipkeepError::NotFound(_))));
        assert!(matches!(store.set_favorite(999, true), Err(ClipkeepError::NotFound(_))));
        assert!(matches!(store.toggle_favorite(999), Err(ClipkeepError::NotFound(_))));
        assert!(matches!(store.get(999), Err(ClipkeepError::NotFound(_))));
        assert!(matches!(store.delete_by_id(999), Err(ClipkeepError::NotFound(_))));
    }

    #[test]
    fn test_delete_older_than_uses_string_order() {
        let (store, _) = store_with(&[
            ("2023-12-31 23:59:59", false),
            ("2024-01-01 00:00:00", false),
            ("2024-01-01 00:00:01", false),
        ]);

        let deleted = store.delete_older_than("2024-01-01 00:00:00").unwrap();
        assert_eq!(deleted, 1);

        let remaining: Vec<String> = store.list().unwrap().into_iter().map(|e| e.timestamp).collect();
        assert_eq!(remaining, vec!["2024-01-01 00:00:01", "2024-01-01 00:00:00"]);
    }

    #[test]
    fn test_replace_ciphertext_keeps_other_fields() {
        let (store, ids) = store_with(&[("2024-01-01 00:00:00", true)]);
        store.set_pinned(ids[0], true).unwrap();

        store.replace_ciphertext(ids[0], b"rekeyed").unwrap();
        let entry = store.get(ids[0]).unwrap();
        assert_eq!(entry.ciphertext, b"rekeyed");
        assert!(entry.pinned);
        assert!(entry.is_code);
        assert_eq!(entry.timestamp, "2024-01-01 00:00:00");

        assert!(store.replace_ciphertext(42, b"x").is_err());
    }

    #[test]
    fn test_text_rows_are_readable() {
        let store = HistoryStore::in_memory().unwrap();
        store
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO history (text, timestamp, is_code) VALUES ('stored as text', '2024-01-01 00:00:00', 0)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.list().unwrap()[0].ciphertext, b"stored as text");
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = HistoryStore::in_memory().unwrap();
        let result: Result<()> = store.with_transaction(|tx| {
            queries::insert(tx, Table::History, b"x", "2024-01-01 00:00:00", false, false, false)?;
            Err(ClipkeepError::InvalidInput("abort".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
    }
}
