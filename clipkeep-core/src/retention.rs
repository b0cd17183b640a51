//! Retention policy: keep, auto-delete, or archive old history entries.

use crate::config::Settings;
use crate::crypto::TokenKey;
use crate::database::Table;
use crate::history::{queries, ArchiveStore, HistoryStore};
use crate::timestamp::cutoff_timestamp;
use crate::{DatabaseError, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Threshold used when the configured value is unusable
pub const DEFAULT_THRESHOLD_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionMode {
    #[default]
    Keep,
    AutoDelete,
    Archive,
}

impl RetentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::AutoDelete => "auto-delete",
            Self::Archive => "archive",
        }
    }

    /// Parse a configured mode; anything unrecognised keeps history.
    pub fn parse(s: &str) -> Self {
        match s {
            "auto-delete" => Self::AutoDelete,
            "archive" => Self::Archive,
            _ => Self::Keep,
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy applied by one retention pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub mode: RetentionMode,
    pub threshold_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            mode: RetentionMode::Keep,
            threshold_days: DEFAULT_THRESHOLD_DAYS,
        }
    }
}

impl RetentionPolicy {
    pub fn new(mode: RetentionMode, threshold_days: u32) -> Self {
        Self { mode, threshold_days }
    }

    /// Read the policy from settings, falling back to 30 days for a
    /// threshold that is not a non-negative integer.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mode: RetentionMode::parse(&settings.history_management),
            threshold_days: settings.history_threshold_days.days_or(DEFAULT_THRESHOLD_DAYS),
        }
    }

    /// Re-read the policy from the settings file.
    ///
    /// Settings that fail to load leave `last` in force.
    pub fn reload(path: &Path, settings_key: Option<&TokenKey>, last: &Self) -> Self {
        match Settings::load(path, settings_key) {
            Ok(settings) => Self::from_settings(&settings),
            Err(e) => {
                warn!("Could not reload settings, keeping {} after {} days: {}", last.mode, last.threshold_days, e);
                *last
            }
        }
    }
}

/// Outcome of one retention pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    pub mode: RetentionMode,
    /// Cutoff timestamp, absent for `keep`
    pub cutoff: Option<String>,
    pub deleted: usize,
    pub archived: usize,
}

/// Applies retention policies to a history store, archiving into a side store
pub struct RetentionEngine {
    history: HistoryStore,
    archive: ArchiveStore,
}

impl RetentionEngine {
    pub fn new(history: HistoryStore, archive: ArchiveStore) -> Self {
        Self { history, archive }
    }

    /// Run one pass against the local clock
    pub fn run_pass(&self, policy: &RetentionPolicy) -> Result<RetentionReport> {
        self.run_pass_at(policy, Local::now().naive_local())
    }

    /// Run one pass with an explicit `now`
    pub fn run_pass_at(&self, policy: &RetentionPolicy, now: NaiveDateTime) -> Result<RetentionReport> {
        let mut report = RetentionReport {
            mode: policy.mode,
            cutoff: None,
            deleted: 0,
            archived: 0,
        };

        if policy.mode == RetentionMode::Keep {
            debug!("Retention mode is keep, nothing to do");
            return Ok(report);
        }

        let cutoff = cutoff_timestamp(now, policy.threshold_days);

        match policy.mode {
            RetentionMode::Keep => {}
            RetentionMode::AutoDelete => {
                report.deleted = self.history.delete_older_than(&cutoff)?;
            }
            RetentionMode::Archive => {
                report.archived = self.archive_older_than(&cutoff)?;
            }
        }

        info!(
            "Retention pass ({}) before {}: {} deleted, {} archived",
            policy.mode, cutoff, report.deleted, report.archived
        );
        report.cutoff = Some(cutoff);
        Ok(report)
    }

    /// Move entries older than `cutoff` into the archive.
    ///
    /// The history lock is held for the whole scan-decide-move section.
    /// Each entry is appended to the archive before it is deleted from
    /// history; an archive failure stops the pass before that entry's delete.
    fn archive_older_than(&self, cutoff: &str) -> Result<usize> {
        self.history.with_connection(|conn| {
            let candidates: Vec<_> = queries::select_all(conn, Table::History, "id ASC")
                .map_err(DatabaseError::Sqlite)?
                .into_iter()
                .filter(|entry| entry.timestamp.as_str() < cutoff)
                .collect();

            let mut moved = 0;
            for entry in candidates {
                self.archive.append(&entry)?;
                queries::delete_by_id(conn, entry.id).map_err(DatabaseError::Sqlite)?;
                debug!("Archived history entry {}", entry.id);
                moved += 1;
            }
            Ok(moved)
        })
    }
}
