use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown file id: {0}")]
    UnknownFile(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote document store organised in per-cost-center folders.
#[async_trait]
pub trait DriveStorage: Send + Sync {
    /// Stores the file and returns its remote id.
    async fn upload(
        &self,
        local_path: &Path,
        display_name: &str,
        folder_id: Option<&str>,
    ) -> Result<String, StorageError>;

    async fn get_shareable_url(&self, file_id: &str) -> Result<String, StorageError>;

    /// Copies a stored file back to `local_path`; `false` when the id is unknown.
    async fn download(&self, file_id: &str, local_path: &Path) -> Result<bool, StorageError>;
}

/// Directory-backed drive. Uploads land in `<root>/<folder>/<id>_<name>`.
pub struct LocalDriveStorage {
    root: PathBuf,
    base_url: String,
    files: DashMap<String, PathBuf>,
    offline: AtomicBool,
}

impl LocalDriveStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            files: DashMap::new(),
            offline: AtomicBool::new(false),
        }
    }

    /// Makes every call fail with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn stored_path(&self, file_id: &str) -> Option<PathBuf> {
        self.files.get(file_id).map(|p| p.value().clone())
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("drive is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl DriveStorage for LocalDriveStorage {
    async fn upload(
        &self,
        local_path: &Path,
        display_name: &str,
        folder_id: Option<&str>,
    ) -> Result<String, StorageError> {
        self.check_online()?;
        let folder = self.root.join(safe_name(folder_id.unwrap_or("shared")));
        tokio::fs::create_dir_all(&folder).await?;

        let file_id = Uuid::new_v4().simple().to_string();
        let target = folder.join(format!("{}_{}", file_id, safe_name(display_name)));
        tokio::fs::copy(local_path, &target).await?;
        self.files.insert(file_id.clone(), target);
        Ok(file_id)
    }

    async fn get_shareable_url(&self, file_id: &str) -> Result<String, StorageError> {
        self.check_online()?;
        if !self.files.contains_key(file_id) {
            return Err(StorageError::UnknownFile(file_id.to_string()));
        }
        Ok(format!("{}/drive/{}", self.base_url, file_id))
    }

    async fn download(&self, file_id: &str, local_path: &Path) -> Result<bool, StorageError> {
        self.check_online()?;
        let Some(source) = self.stored_path(file_id) else {
            return Ok(false);
        };
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, local_path).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn upload_share_and_download() {
        let dir = tempfile::tempdir().unwrap();
        let drive = LocalDriveStorage::new(dir.path().join("drive"), "http://epv.local/");
        let src = dir.path().join("doc.pdf");
        tokio::fs::write(&src, b"PDF").await.unwrap();

        let id = drive.upload(&src, "EPV 1.pdf", Some("folder-1")).await.unwrap();
        let url = drive.get_shareable_url(&id).await.unwrap();
        assert_eq!(url, format!("http://epv.local/drive/{}", id));

        let back = dir.path().join("back/doc.pdf");
        assert!(drive.download(&id, &back).await.unwrap());
        assert_eq!(tokio::fs::read(back).await.unwrap(), b"PDF");
        assert!(!drive.download("missing", &dir.path().join("x")).await.unwrap());
    }

    #[tokio::test]
    async fn offline_drive_fails_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let drive = LocalDriveStorage::new(dir.path(), "http://epv.local");
        drive.set_offline(true);
        let result = drive.upload(&dir.path().join("x"), "x", None).await;
        assert_matches!(result, Err(StorageError::Unavailable(_)));
    }
}
