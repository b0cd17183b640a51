//! In-process remote used by tests and dry runs.

use super::remote::{Credential, RemoteError, RemoteStorage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Remote call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Authenticate,
    Upload,
    Download,
    Delete,
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: Option<Vec<u8>>,
    fail_on: Option<FailPoint>,
    delay: Option<Duration>,
    uploads: usize,
}

/// Clones share the same stored snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Vec<u8>) -> Self {
        let remote = Self::new();
        remote.state().snapshot = Some(snapshot);
        remote
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not wedge the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.state().snapshot.clone()
    }

    pub fn uploads(&self) -> usize {
        self.state().uploads
    }

    pub fn fail_on(&self, point: Option<FailPoint>) {
        self.state().fail_on = point;
    }

    /// Make every download wait `delay` before answering
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    fn check(&self, point: FailPoint) -> Result<(), RemoteError> {
        if self.state().fail_on == Some(point) {
            return Err(match point {
                FailPoint::Authenticate => RemoteError::Authentication("injected failure".to_string()),
                _ => RemoteError::Transport(format!("injected {:?} failure", point)),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStorage for MemoryRemote {
    async fn authenticate(&self) -> Result<Credential, RemoteError> {
        self.check(FailPoint::Authenticate)?;
        Ok(Credential {
            location: "memory".to_string(),
        })
    }

    async fn upload(&self, snapshot: Vec<u8>) -> Result<(), RemoteError> {
        self.check(FailPoint::Upload)?;
        let mut state = self.state();
        state.snapshot = Some(snapshot);
        state.uploads += 1;
        Ok(())
    }

    async fn download(&self) -> Result<Option<Vec<u8>>, RemoteError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(FailPoint::Download)?;
        Ok(self.snapshot())
    }

    async fn delete(&self) -> Result<bool, RemoteError> {
        self.check(FailPoint::Delete)?;
        Ok(self.state().snapshot.take().is_some())
    }
}
