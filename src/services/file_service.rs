//! Text log files on a file share.

use crate::{
    models::file::LogFile,
    storage::{StorageAccount, StorageResult, share::ShareClient},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::StorageResultExt;

pub const DEFAULT_SHARE: &str = "logs";

#[derive(Clone)]
pub struct FileService {
    account: StorageAccount,
}

impl FileService {
    pub fn new(account: StorageAccount) -> Self {
        Self { account }
    }

    fn share(&self, share: &str) -> ShareClient {
        self.account.share_client(share)
    }

    /// Write `content` as `file_name` at the share root, creating the share
    /// when missing. An existing file is replaced.
    pub async fn upload_log(&self, file_name: &str, content: &str, share: &str) -> StorageResult<()> {
        self.create_share(share).await?;
        self.share(share)
            .upload_file(file_name, Bytes::copy_from_slice(content.as_bytes()))
            .await?;
        info!(file_name, share, "Uploaded log file");
        Ok(())
    }

    /// Log content, or `None` when the file or the share does not exist.
    pub async fn download_log(&self, file_name: &str, share: &str) -> StorageResult<Option<String>> {
        let Some(bytes) = self.share(share).download_file(file_name).await.optional()? else {
            return Ok(None);
        };
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Every log at the share root with its content loaded. Empty when the
    /// share does not exist.
    pub async fn list_logs(&self, share: &str) -> StorageResult<Vec<LogFile>> {
        if !self.share_exists(share).await? {
            debug!(share, "share missing; no logs to list");
            return Ok(Vec::new());
        }

        let mut logs = Vec::new();
        for file in self.share(share).list_files().await? {
            let content = self
                .download_log(&file.name, share)
                .await?
                .unwrap_or_default();
            logs.push(LogFile {
                file_path: format!("/{}", file.name),
                file_name: file.name,
                share_name: share.to_string(),
                directory_path: "/".to_string(),
                file_size: file.size_bytes,
                last_modified: file.last_modified,
                content,
            });
        }
        Ok(logs)
    }

    pub async fn delete_log(&self, file_name: &str, share: &str) -> StorageResult<bool> {
        self.share(share).delete_if_exists(file_name).await
    }

    pub async fn share_exists(&self, share: &str) -> StorageResult<bool> {
        self.share(share).exists().await
    }

    pub async fn create_share(&self, share: &str) -> StorageResult<bool> {
        self.share(share).create_if_not_exists().await
    }
}

/// Name for an activity log entry, e.g. `upload_20250301_142230.log`.
pub fn activity_log_name(action: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.log", action, at.format("%Y%m%d_%H%M%S"))
}
