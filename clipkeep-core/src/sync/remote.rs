//! Remote storage seam for snapshot sync.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote authentication failed: {0}")]
    Authentication(String),

    #[error("Remote transport error: {0}")]
    Transport(String),

    #[error("Remote I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Proof of a successful `authenticate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Human-readable description of where snapshots are stored
    pub location: String,
}

/// Holds a single snapshot blob on behalf of the sync engine.
///
/// Timeouts are the implementation's concern and surface as `Transport`.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    async fn authenticate(&self) -> Result<Credential, RemoteError>;

    /// Replace the stored snapshot
    async fn upload(&self, snapshot: Vec<u8>) -> Result<(), RemoteError>;

    /// Fetch the stored snapshot, `None` if nothing has been uploaded yet
    async fn download(&self) -> Result<Option<Vec<u8>>, RemoteError>;

    /// Remove the stored snapshot; true if one existed
    async fn delete(&self) -> Result<bool, RemoteError>;
}
