//! Database schema and connection management.

use crate::{ClipkeepError, DatabaseError, Result};
use rusqlite::Connection;
use std::path::Path;

/// Current schema version. Incremented when the schema changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Row tables sharing the history column layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    History,
    Archive,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Archive => "archive_history",
        }
    }
}

/// Main database connection and schema manager
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(DatabaseError::Sqlite)?;
        Ok(Self { conn })
    }

    /// Create a new in-memory database for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Sqlite)?;
        Ok(Self { conn })
    }

    /// Initialize metadata and the given row table
    pub fn initialize_schema(&self, table: Table) -> Result<()> {
        self.create_db_metadata_table()?;
        self.create_rows_table(table)?;
        self.create_indexes(table)?;
        self.validate_schema_version()
    }

    fn create_db_metadata_table(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS db_metadata (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    version INTEGER NOT NULL
                );
                INSERT OR IGNORE INTO db_metadata (id, version) VALUES (1, 1);",
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_rows_table(&self, table: Table) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text BLOB NOT NULL,
                timestamp TEXT NOT NULL,
                is_code INTEGER NOT NULL DEFAULT 0,
                pinned INTEGER NOT NULL DEFAULT 0,
                favorite INTEGER NOT NULL DEFAULT 0
            )",
            table.name()
        );
        self.conn.execute(&sql, []).map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_indexes(&self, table: Table) -> Result<()> {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_timestamp ON {0}(timestamp)",
            table.name()
        );
        self.conn.execute(&sql, []).map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    /// Validate the database schema version.
    pub fn validate_schema_version(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("SELECT version FROM db_metadata WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map_err(DatabaseError::Sqlite)?;

        if version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        Err(ClipkeepError::from(DatabaseError::SchemaMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: version,
        }))
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference, needed to open transactions
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(db: &Database, kind: &str) -> Vec<String> {
        db.conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_history_schema() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema(Table::History).unwrap();

        let tables = names(&db, "table");
        assert!(tables.contains(&"db_metadata".to_string()));
        assert!(tables.contains(&"history".to_string()));
        assert!(!tables.contains(&"archive_history".to_string()));
        assert!(names(&db, "index").contains(&"idx_history_timestamp".to_string()));
    }

    #[test]
    fn test_archive_schema() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema(Table::Archive).unwrap();
        assert!(names(&db, "table").contains(&"archive_history".to_string()));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema(Table::History).unwrap();
        db.initialize_schema(Table::History).unwrap();
    }

    #[test]
    fn test_schema_version_mismatch() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema(Table::History).unwrap();
        db.conn
            .execute("UPDATE db_metadata SET version = 99 WHERE id = 1", [])
            .unwrap();

        assert!(matches!(
            db.validate_schema_version(),
            Err(ClipkeepError::Database(DatabaseError::SchemaMismatch {
                expected: 1,
                found: 99
            }))
        ));
    }
}
