//! Blob containers: payloads on disk, properties and metadata in SQLite.

use super::{
    StorageAccount, StorageError, StorageResult, ensure_item_name, ensure_resource_name,
    table::is_unique_violation,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::{collections::HashMap, io::ErrorKind, path::PathBuf};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Anonymous read access granted on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicAccess {
    None,
    /// Anonymous reads of individual blobs.
    Blob,
}

impl PublicAccess {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Blob => "blob",
        }
    }
}

/// Provider-reported properties of a stored blob.
#[derive(Debug, Clone)]
pub struct BlobProperties {
    pub name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

#[derive(FromRow)]
struct BlobRow {
    name: String,
    content_type: String,
    size_bytes: i64,
    etag: String,
    last_modified: DateTime<Utc>,
    metadata: String,
}

impl TryFrom<BlobRow> for BlobProperties {
    type Error = StorageError;

    fn try_from(row: BlobRow) -> StorageResult<Self> {
        Ok(Self {
            name: row.name,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            etag: row.etag,
            last_modified: row.last_modified,
            metadata: serde_json::from_str(&row.metadata)?,
        })
    }
}

#[derive(Clone)]
pub struct BlobContainerClient {
    account: StorageAccount,
    name: String,
}

impl BlobContainerClient {
    pub(crate) fn new(account: StorageAccount, name: &str) -> Self {
        Self {
            account,
            name: name.to_string(),
        }
    }

    fn container_root(&self) -> StorageResult<PathBuf> {
        ensure_resource_name("container", &self.name)?;
        Ok(self.account.blob_root()?.join(&self.name))
    }

    fn blob_path(&self, blob: &str) -> StorageResult<PathBuf> {
        ensure_item_name("blob", blob)?;
        Ok(self.container_root()?.join(blob))
    }

    fn blob_not_found(&self, blob: &str) -> StorageError {
        StorageError::not_found("blob", format!("{}/{}", self.name, blob))
    }

    /// Create the container and its directory. Returns `true` when it did
    /// not exist before; an existing container keeps its access level.
    pub async fn create_if_not_exists(&self, access: PublicAccess) -> StorageResult<bool> {
        fs::create_dir_all(self.container_root()?).await?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO containers (name, public_access, created_at) VALUES (?, ?, ?)",
        )
        .bind(&self.name)
        .bind(access.as_str())
        .bind(Utc::now())
        .execute(self.account.db()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM containers WHERE name = ?")
            .bind(&self.name)
            .fetch_one(self.account.db()?)
            .await?;
        Ok(found > 0)
    }

    async fn ensure_exists(&self) -> StorageResult<()> {
        if self.exists().await? {
            Ok(())
        } else {
            Err(StorageError::not_found("container", &self.name))
        }
    }

    /// Write `data` and its `metadata` under `blob`, replacing any earlier
    /// payload and metadata when `overwrite` is set.
    ///
    /// The payload goes to a temporary file first. The property row is
    /// written inside a transaction that only commits once the file has been
    /// renamed into place, so readers never observe a partial blob and a
    /// failed row write leaves no payload behind.
    pub async fn upload(
        &self,
        blob: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
        overwrite: bool,
    ) -> StorageResult<BlobProperties> {
        ensure_item_name("blob", blob)?;
        self.ensure_exists().await?;

        if !overwrite && self.properties(blob).await.is_ok() {
            return Err(StorageError::AlreadyExists {
                kind: "blob",
                name: format!("{}/{}", self.name, blob),
            });
        }

        let encoded = serde_json::to_string(metadata)?;
        let file_path = self.blob_path(blob)?;
        let tmp_path = self.container_root()?.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_all_synced(&mut file, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        let etag = format!("\"{:x}\"", md5::compute(&data));
        let last_modified = Utc::now();
        let size_bytes = data.len() as i64;

        let query = if overwrite {
            "INSERT INTO blobs (container, name, content_type, size_bytes, etag, last_modified, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(container, name) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                metadata = excluded.metadata"
        } else {
            "INSERT INTO blobs (container, name, content_type, size_bytes, etag, last_modified, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        };

        let mut tx = match self.account.db()?.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Sqlx(err));
            }
        };
        let inserted = sqlx::query(query)
            .bind(&self.name)
            .bind(blob)
            .bind(content_type)
            .bind(size_bytes)
            .bind(&etag)
            .bind(last_modified)
            .bind(&encoded)
            .execute(&mut *tx)
            .await;
        if let Err(err) = inserted {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(if is_unique_violation(&err) {
                StorageError::AlreadyExists {
                    kind: "blob",
                    name: format!("{}/{}", self.name, blob),
                }
            } else {
                StorageError::Sqlx(err)
            });
        }

        // Dropping `tx` rolls the row back.
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = tx.commit().await {
            warn!(container = %self.name, blob, error = %err, "blob row commit failed after payload rename");
            return Err(StorageError::Sqlx(err));
        }

        debug!(container = %self.name, blob, size_bytes, "stored blob");
        Ok(BlobProperties {
            name: blob.to_string(),
            content_type: content_type.to_string(),
            size_bytes,
            etag,
            last_modified,
            metadata: metadata.clone(),
        })
    }

    pub async fn properties(&self, blob: &str) -> StorageResult<BlobProperties> {
        sqlx::query_as::<_, BlobRow>(
            "SELECT name, content_type, size_bytes, etag, last_modified, metadata
             FROM blobs WHERE container = ? AND name = ?",
        )
        .bind(&self.name)
        .bind(blob)
        .fetch_optional(self.account.db()?)
        .await?
        .ok_or_else(|| self.blob_not_found(blob))?
        .try_into()
    }

    /// Names of every blob in the container, in lexicographic order.
    pub async fn list_blob_names(&self) -> StorageResult<Vec<String>> {
        self.ensure_exists().await?;
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM blobs WHERE container = ? ORDER BY name ASC",
        )
        .bind(&self.name)
        .fetch_all(self.account.db()?)
        .await?;
        Ok(names)
    }

    /// Properties plus an open handle positioned at the start of the payload.
    pub async fn open_read(&self, blob: &str) -> StorageResult<(BlobProperties, File)> {
        ensure_item_name("blob", blob)?;
        let properties = self.properties(blob).await?;
        let file = File::open(self.blob_path(blob)?).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                self.blob_not_found(blob)
            } else {
                StorageError::Io(err)
            }
        })?;
        Ok((properties, file))
    }

    /// Remove `blob` if present. Returns whether anything was deleted.
    pub async fn delete_if_exists(&self, blob: &str) -> StorageResult<bool> {
        ensure_item_name("blob", blob)?;
        let result = sqlx::query("DELETE FROM blobs WHERE container = ? AND name = ?")
            .bind(&self.name)
            .bind(blob)
            .execute(self.account.db()?)
            .await?;

        let file_path = self.blob_path(blob)?;
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        Ok(result.rows_affected() > 0)
    }
}

async fn write_all_synced(file: &mut File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}
