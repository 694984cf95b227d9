//! File shares: one directory per share beneath the share root.

use super::{StorageAccount, StorageError, StorageResult, ensure_item_name, ensure_resource_name};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{io::ErrorKind, path::PathBuf};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFileProperties {
    pub name: String,
    pub size_bytes: i64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ShareClient {
    account: StorageAccount,
    name: String,
}

impl ShareClient {
    pub(crate) fn new(account: StorageAccount, name: &str) -> Self {
        Self {
            account,
            name: name.to_string(),
        }
    }

    fn share_root(&self) -> StorageResult<PathBuf> {
        ensure_resource_name("share", &self.name)?;
        Ok(self.account.share_root()?.join(&self.name))
    }

    fn file_path(&self, file: &str) -> StorageResult<PathBuf> {
        ensure_item_name("file", file)?;
        Ok(self.share_root()?.join(file))
    }

    fn file_not_found(&self, file: &str) -> StorageError {
        StorageError::not_found("file", format!("{}/{}", self.name, file))
    }

    /// Returns `true` when the share did not exist before.
    pub async fn create_if_not_exists(&self) -> StorageResult<bool> {
        let root = self.share_root()?;
        let existed = fs::try_exists(&root).await?;
        fs::create_dir_all(&root).await?;
        Ok(!existed)
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        let root = self.share_root()?;
        Ok(fs::try_exists(&root).await? && fs::metadata(&root).await?.is_dir())
    }

    async fn ensure_exists(&self) -> StorageResult<()> {
        if self.exists().await? {
            Ok(())
        } else {
            Err(StorageError::not_found("share", &self.name))
        }
    }

    /// Create or replace `file` at the share root with `content`.
    pub async fn upload_file(&self, file: &str, content: Bytes) -> StorageResult<()> {
        let file_path = self.file_path(file)?;
        self.ensure_exists().await?;

        let tmp_path = self.share_root()?.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut handle = File::create(&tmp_path).await?;
        let written = async {
            handle.write_all(&content).await?;
            handle.flush().await?;
            handle.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!(share = %self.name, file, bytes = content.len(), "wrote share file");
        Ok(())
    }

    pub async fn download_file(&self, file: &str) -> StorageResult<Bytes> {
        let file_path = self.file_path(file)?;
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(self.file_not_found(file)),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub async fn file_properties(&self, file: &str) -> StorageResult<ShareFileProperties> {
        let file_path = self.file_path(file)?;
        let metadata = match fs::metadata(&file_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(self.file_not_found(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(self.file_not_found(file)),
            Err(err) => return Err(StorageError::Io(err)),
        };
        Ok(ShareFileProperties {
            name: file.to_string(),
            size_bytes: metadata.len() as i64,
            last_modified: DateTime::<Utc>::from(metadata.modified()?),
        })
    }

    /// Regular files at the share root, sorted by name. Directories and
    /// in-flight temporary files are skipped.
    pub async fn list_files(&self) -> StorageResult<Vec<ShareFileProperties>> {
        self.ensure_exists().await?;
        let mut entries = fs::read_dir(self.share_root()?).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(".tmp-") {
                continue;
            }
            files.push(ShareFileProperties {
                name,
                size_bytes: metadata.len() as i64,
                last_modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Remove `file` if present. Returns whether anything was deleted.
    pub async fn delete_if_exists(&self, file: &str) -> StorageResult<bool> {
        let file_path = self.file_path(file)?;
        match fs::remove_file(&file_path).await {
            Ok(_) => {
                debug!("removed share file {}", file_path.display());
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_account;

    #[tokio::test]
    async fn create_upload_download_delete() {
        let (_dir, account) = temp_account().await;
        let share = account.share_client("logs");
        assert!(!share.exists().await.unwrap());
        assert!(share.create_if_not_exists().await.unwrap());
        assert!(!share.create_if_not_exists().await.unwrap());

        share
            .upload_file("a.log", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        share
            .upload_file("a.log", Bytes::from_static(b"replaced"))
            .await
            .unwrap();
        assert_eq!(&share.download_file("a.log").await.unwrap()[..], b"replaced");
        assert_eq!(share.file_properties("a.log").await.unwrap().size_bytes, 8);

        assert!(share.delete_if_exists("a.log").await.unwrap());
        assert!(!share.delete_if_exists("a.log").await.unwrap());
        assert!(share.download_file("a.log").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_skips_directories() {
        let (dir, account) = temp_account().await;
        let share = account.share_client("logs");
        share.create_if_not_exists().await.unwrap();
        share.upload_file("b.log", Bytes::from_static(b"b")).await.unwrap();
        share.upload_file("a.log", Bytes::from_static(b"a")).await.unwrap();
        std::fs::create_dir(dir.path().join("shares/logs/archive")).unwrap();

        let names: Vec<_> = share
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, ["a.log", "b.log"]);
    }

    #[tokio::test]
    async fn upload_to_missing_share_is_not_found() {
        let (_dir, account) = temp_account().await;
        let share = account.share_client("missing");
        let err = share
            .upload_file("a.log", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(share.list_files().await.unwrap_err().is_not_found());
    }
}
