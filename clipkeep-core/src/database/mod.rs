//! Database layer for the history vault.
//!
//! This module handles connection management, schema creation and the row
//! model shared by the history and archive databases.

pub mod models;
pub mod schema;

pub use models::HistoryEntry;
pub use schema::{Database, Table};
