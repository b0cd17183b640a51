//! SQL shared by the history and archive tables.
//!
//! Every function takes a plain `&Connection`, so callers can run them on the
//! store's locked connection or inside a transaction.

use crate::database::{HistoryEntry, Table};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, text, timestamp, is_code, pinned, favorite";

/// Read the `text` column, accepting rows written as TEXT or BLOB
fn read_ciphertext(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<u8>> {
    match row.get_ref(idx)? {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(bytes.to_vec()),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "text".to_string(),
            other.data_type(),
        )),
    }
}

fn map_entry(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        ciphertext: read_ciphertext(row, 1)?,
        timestamp: row.get(2)?,
        is_code: row.get::<_, i64>(3)? != 0,
        pinned: row.get::<_, i64>(4)? != 0,
        favorite: row.get::<_, i64>(5)? != 0,
    })
}

pub(crate) fn insert(
    conn: &Connection,
    table: Table,
    ciphertext: &[u8],
    timestamp: &str,
    is_code: bool,
    pinned: bool,
    favorite: bool,
) -> rusqlite::Result<i64> {
    let sql = format!(
        "INSERT INTO {} (text, timestamp, is_code, pinned, favorite) VALUES (?1, ?2, ?3, ?4, ?5)",
        table.name()
    );
    conn.execute(&sql, params![ciphertext, timestamp, is_code, pinned, favorite])?;
    Ok(conn.last_insert_rowid())
}

/// All rows in display order. Rows that cannot be decoded are skipped.
pub(crate) fn select_all(conn: &Connection, table: Table, order: &str) -> rusqlite::Result<Vec<HistoryEntry>> {
    select_where(conn, table, "1 = 1", order)
}

pub(crate) fn select_where(
    conn: &Connection,
    table: Table,
    filter: &str,
    order: &str,
) -> rusqlite::Result<Vec<HistoryEntry>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        COLUMNS,
        table.name(),
        filter,
        order
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        match row {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!("Skipping malformed {} row: {}", table.name(), e),
        }
    }
    Ok(entries)
}

pub(crate) fn select_one(conn: &Connection, table: Table, id: i64) -> rusqlite::Result<Option<HistoryEntry>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", COLUMNS, table.name());
    conn.query_row(&sql, [id], map_entry).optional()
}

pub(crate) fn count(conn: &Connection, table: Table) -> rusqlite::Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(n as usize)
}

/// Flag columns that may be toggled
#[derive(Debug, Clone, Copy)]
pub(crate) enum Flag {
    Pinned,
    Favorite,
}

impl Flag {
    fn column(&self) -> &'static str {
        match self {
            Self::Pinned => "pinned",
            Self::Favorite => "favorite",
        }
    }
}

/// Returns the number of matched rows
pub(crate) fn update_flag(conn: &Connection, flag: Flag, id: i64, value: bool) -> rusqlite::Result<usize> {
    let sql = format!("UPDATE history SET {} = ?1 WHERE id = ?2", flag.column());
    conn.execute(&sql, params![value, id])
}

pub(crate) fn update_ciphertext(conn: &Connection, id: i64, ciphertext: &[u8]) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE history SET text = ?1 WHERE id = ?2",
        params![ciphertext, id],
    )
}

pub(crate) fn delete_by_id(conn: &Connection, id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM history WHERE id = ?1", [id])
}

pub(crate) fn delete_older_than(conn: &Connection, cutoff: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM history WHERE timestamp < ?1", [cutoff])
}
