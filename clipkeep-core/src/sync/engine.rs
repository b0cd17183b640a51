//! Sync engine: download, merge, snapshot, upload.

use super::merge::{merge_snapshot, MergeReport};
use super::models::{SyncRecord, SyncSnapshot};
use super::remote::RemoteStorage;
use crate::database::Table;
use crate::history::{queries, HistoryStore};
use crate::{DatabaseError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Outcome of one sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub merge: MergeReport,
    pub uploaded_records: usize,
}

/// Exchanges whole-history snapshots with a remote store.
#[derive(Clone)]
pub struct SyncEngine {
    history: HistoryStore,
    remote: Arc<dyn RemoteStorage>,
}

impl SyncEngine {
    pub fn new(history: HistoryStore, remote: Arc<dyn RemoteStorage>) -> Self {
        Self { history, remote }
    }

    /// Every history entry in sync shape, in id order.
    pub fn snapshot(&self) -> Result<SyncSnapshot> {
        let entries = self.history.with_connection(|conn| {
            queries::select_all(conn, Table::History, "id ASC").map_err(|e| DatabaseError::Sqlite(e).into())
        })?;

        let records = entries
            .iter()
            .filter_map(|entry| {
                let record = SyncRecord::from_entry(entry);
                if record.is_none() {
                    warn!("Entry {} has non-text ciphertext, leaving it out of the snapshot", entry.id);
                }
                record
            })
            .collect();
        Ok(SyncSnapshot::new(records))
    }

    /// Merge `remote` into local history in a single transaction.
    pub fn merge(&self, remote: &SyncSnapshot) -> Result<MergeReport> {
        self.history
            .with_transaction(|tx| merge_snapshot(tx, remote).map_err(|e| DatabaseError::Sqlite(e).into()))
    }

    /// One full cycle.
    ///
    /// A failure before the merge leaves both sides untouched. A failed
    /// upload leaves the merged local state in place and the remote as it was.
    pub async fn sync_cycle(&self) -> Result<SyncReport> {
        let credential = self.remote.authenticate().await?;
        debug!("Authenticated with remote at {}", credential.location);

        let remote = match self.remote.download().await? {
            Some(bytes) => SyncSnapshot::from_bytes(&bytes)?,
            None => {
                info!("No remote snapshot yet, starting from empty");
                SyncSnapshot::default()
            }
        };

        let merge = self.merge(&remote)?;
        let local = self.snapshot()?;
        let uploaded_records = local.len();
        self.remote.upload(local.to_bytes()?).await?;

        info!(
            "Sync complete: {} inserted, {} flag updates, {} skipped, {} uploaded",
            merge.inserted, merge.flags_updated, merge.skipped, uploaded_records
        );
        Ok(SyncReport { merge, uploaded_records })
    }

    /// Remove the remote snapshot; local history is unaffected.
    pub async fn purge_remote(&self) -> Result<bool> {
        self.remote.authenticate().await?;
        let removed = self.remote.delete().await?;
        info!("Remote snapshot purge: removed={}", removed);
        Ok(removed)
    }

    /// Run a cycle every `interval` until `shutdown` flips to true.
    ///
    /// An in-flight cycle is dropped at its next remote await when shutdown
    /// is signalled; the local merge itself is never interrupted.
    pub async fn run_periodic(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            // Only a change to `true` cancels the cycle. A closed channel
            // lets the cycle finish and then stops the loop.
            let mut sender_gone = false;
            let cycle = self.sync_cycle();
            tokio::pin!(cycle);
            let outcome = loop {
                tokio::select! {
                    result = &mut cycle => break Some(result),
                    changed = shutdown.changed(), if !sender_gone => {
                        if changed.is_err() {
                            sender_gone = true;
                        } else if *shutdown.borrow() {
                            break None;
                        }
                    }
                }
            };

            match outcome {
                None => {
                    info!("Sync cancelled by shutdown");
                    break;
                }
                Some(Err(e)) => error!("Sync cycle failed: {}", e),
                Some(Ok(_)) => {}
            }
            if sender_gone {
                break;
            }
        }
        debug!("Periodic sync stopped");
    }
}
