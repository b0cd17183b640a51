//! Folder-backed remote, e.g. a directory kept in sync by a cloud client.

use super::remote::{Credential, RemoteError, RemoteStorage};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the shared snapshot
pub const SYNC_FILENAME: &str = "clipboard_history.json";

#[derive(Debug, Clone)]
pub struct DirectoryRemote {
    dir: PathBuf,
}

impl DirectoryRemote {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SYNC_FILENAME)
    }
}

#[async_trait]
impl RemoteStorage for DirectoryRemote {
    async fn authenticate(&self) -> Result<Credential, RemoteError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let meta = tokio::fs::metadata(&self.dir).await?;
        if !meta.is_dir() {
            return Err(RemoteError::Authentication(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        Ok(Credential {
            location: self.dir.display().to_string(),
        })
    }

    async fn upload(&self, snapshot: Vec<u8>) -> Result<(), RemoteError> {
        let path = self.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &snapshot).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote {} bytes to {}", snapshot.len(), path.display());
        Ok(())
    }

    async fn download(&self) -> Result<Option<Vec<u8>>, RemoteError> {
        match tokio::fs::read(self.snapshot_path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self) -> Result<bool, RemoteError> {
        match tokio::fs::remove_file(self.snapshot_path()).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_directory_roundtrip() {
        let dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(dir.path().join("sync"));

        let credential = remote.authenticate().await.unwrap();
        assert!(credential.location.ends_with("sync"));
        assert_eq!(remote.download().await.unwrap(), None);

        remote.upload(b"[]".to_vec()).await.unwrap();
        remote.upload(b"[1]".to_vec()).await.unwrap();
        assert_eq!(remote.download().await.unwrap(), Some(b"[1]".to_vec()));

        assert!(remote.delete().await.unwrap());
        assert!(!remote.delete().await.unwrap());
        assert_eq!(remote.download().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_in_place_of_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let remote = DirectoryRemote::new(&blocker);
        assert!(remote.authenticate().await.is_err());
    }
}
