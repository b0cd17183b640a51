//! Timestamp-keyed merge of a remote snapshot into local history.

use super::models::SyncSnapshot;
use crate::database::Table;
use crate::history::queries::{self, Flag};
use crate::timestamp::is_valid_timestamp;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::warn;

/// Counts from one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub flags_updated: usize,
    pub skipped: usize,
}

struct LocalFlags {
    id: i64,
    pinned: bool,
    favorite: bool,
}

/// Apply `remote` to the history table on `conn`.
///
/// Unknown timestamps are inserted as fresh entries with default flags.
/// Known timestamps take the remote pinned/favorite values; their
/// ciphertext and code flag stay as they are. Nothing is ever deleted.
pub(crate) fn merge_snapshot(conn: &Connection, remote: &SyncSnapshot) -> rusqlite::Result<MergeReport> {
    let mut report = MergeReport::default();

    // Ascending ids, so a shared timestamp resolves to the newest entry
    let mut local: HashMap<String, LocalFlags> = HashMap::new();
    for entry in queries::select_all(conn, Table::History, "id ASC")? {
        local.insert(
            entry.timestamp,
            LocalFlags {
                id: entry.id,
                pinned: entry.pinned,
                favorite: entry.favorite,
            },
        );
    }

    for record in &remote.records {
        if !is_valid_timestamp(&record.timestamp) {
            warn!("Skipping remote record with malformed timestamp {:?}", record.timestamp);
            report.skipped += 1;
            continue;
        }

        match local.get_mut(&record.timestamp) {
            Some(existing) => {
                let mut changed = false;
                if existing.pinned != record.pinned {
                    queries::update_flag(conn, Flag::Pinned, existing.id, record.pinned)?;
                    existing.pinned = record.pinned;
                    changed = true;
                }
                if existing.favorite != record.favorite {
                    queries::update_flag(conn, Flag::Favorite, existing.id, record.favorite)?;
                    existing.favorite = record.favorite;
                    changed = true;
                }
                if changed {
                    report.flags_updated += 1;
                }
            }
            None => {
                let id = queries::insert(
                    conn,
                    Table::History,
                    record.text.as_bytes(),
                    &record.timestamp,
                    record.is_code,
                    false,
                    false,
                )?;
                local.insert(
                    record.timestamp.clone(),
                    LocalFlags {
                        id,
                        pinned: false,
                        favorite: false,
                    },
                );
                report.inserted += 1;
            }
        }
    }

    Ok(report)
}
