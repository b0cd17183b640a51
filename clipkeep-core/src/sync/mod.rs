//! Snapshot sync for clipboard history
//!
//! The whole history is exchanged as one JSON snapshot:
//! - Download the remote snapshot (absent means empty)
//! - Merge it locally, keyed by capture timestamp, remote flags winning
//! - Upload the merged local state, replacing the remote copy
//!
//! Ciphertexts travel as-is; sync never decrypts.

pub mod directory;
pub mod engine;
pub mod memory;
pub mod merge;
pub mod models;
pub mod remote;

pub use directory::DirectoryRemote;
pub use engine::{SyncEngine, SyncReport};
pub use memory::{FailPoint, MemoryRemote};
pub use merge::MergeReport;
pub use models::{SyncRecord, SyncSnapshot};
pub use remote::{Credential, RemoteError, RemoteStorage};
