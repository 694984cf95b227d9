//! Connection-string parsing and the shared storage account handle.

use super::{
    StorageError, StorageResult, blob::BlobContainerClient, queue::QueueClient,
    share::ShareClient, table::TableClient,
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");
const MAX_CONNECTIONS: u32 = 5;

/// Parsed form of a `Key=Value;Key=Value` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub database_url: String,
    pub blob_root: PathBuf,
    pub share_root: PathBuf,
}

impl FromStr for ConnectionSettings {
    type Err = StorageError;

    /// `Root=<dir>` derives every location; `DatabaseUrl`, `BlobRoot` and
    /// `ShareRoot` override individual ones. Keys are case-insensitive and
    /// unknown keys are ignored.
    fn from_str(raw: &str) -> StorageResult<Self> {
        let mut root = None;
        let mut database_url = None;
        let mut blob_root = None;
        let mut share_root = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                StorageError::InvalidConnectionString(format!(
                    "segment `{segment}` is not of the form Key=Value"
                ))
            })?;
            let value = value.trim();
            if value.is_empty() {
                return Err(StorageError::InvalidConnectionString(format!(
                    "`{}` has an empty value",
                    key.trim()
                )));
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "root" => root = Some(PathBuf::from(value)),
                "databaseurl" => database_url = Some(value.to_string()),
                "blobroot" => blob_root = Some(PathBuf::from(value)),
                "shareroot" => share_root = Some(PathBuf::from(value)),
                other => debug!("ignoring unknown connection string key `{}`", other),
            }
        }

        let missing = |what: &str| {
            StorageError::InvalidConnectionString(format!("`Root` or `{what}` is required"))
        };

        let database_url = match (database_url, &root) {
            (Some(url), _) => url,
            (None, Some(root)) => format!("sqlite://{}", root.join("tables.db").display()),
            (None, None) => return Err(missing("DatabaseUrl")),
        };
        let blob_root = match (blob_root, &root) {
            (Some(path), _) => path,
            (None, Some(root)) => root.join("blobs"),
            (None, None) => return Err(missing("BlobRoot")),
        };
        let share_root = match (share_root, &root) {
            (Some(path), _) => path,
            (None, Some(root)) => root.join("shares"),
            (None, None) => return Err(missing("ShareRoot")),
        };

        Ok(Self {
            database_url,
            blob_root,
            share_root,
        })
    }
}

struct AccountInner {
    db: SqlitePool,
    blob_root: PathBuf,
    share_root: PathBuf,
}

/// Handle to the storage account. Cheap to clone; every client shares the
/// same pool and roots.
///
/// A disconnected account (no connection string configured) constructs
/// clients normally, but every client call fails with
/// [`StorageError::NotConfigured`].
#[derive(Clone)]
pub struct StorageAccount {
    inner: Option<Arc<AccountInner>>,
}

impl StorageAccount {
    /// Parse `connection_string`, open the SQLite pool, apply migrations and
    /// create the blob and share roots.
    pub async fn connect(connection_string: &str) -> StorageResult<Self> {
        let settings: ConnectionSettings = connection_string.parse()?;
        Self::connect_with(settings).await
    }

    pub async fn connect_with(settings: ConnectionSettings) -> StorageResult<Self> {
        let db_path = settings
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                info!("Created missing directory {:?}", parent);
            }
        }

        let options = SqliteConnectOptions::from_str(&settings.database_url)?
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let applied = run_migrations(&db).await?;
        debug!("Applied {} schema statements", applied);

        fs::create_dir_all(&settings.blob_root).await?;
        fs::create_dir_all(&settings.share_root).await?;

        info!(
            database = %settings.database_url,
            blob_root = %settings.blob_root.display(),
            share_root = %settings.share_root.display(),
            "Storage account connected"
        );

        Ok(Self {
            inner: Some(Arc::new(AccountInner {
                db,
                blob_root: settings.blob_root,
                share_root: settings.share_root,
            })),
        })
    }

    pub fn disconnected() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    fn inner(&self) -> StorageResult<&AccountInner> {
        self.inner.as_deref().ok_or(StorageError::NotConfigured)
    }

    pub(crate) fn db(&self) -> StorageResult<&SqlitePool> {
        Ok(&self.inner()?.db)
    }

    pub(crate) fn blob_root(&self) -> StorageResult<&Path> {
        Ok(&self.inner()?.blob_root)
    }

    pub(crate) fn share_root(&self) -> StorageResult<&Path> {
        Ok(&self.inner()?.share_root)
    }

    pub fn table_client(&self, name: &str) -> TableClient {
        TableClient::new(self.clone(), name)
    }

    pub fn container_client(&self, name: &str) -> BlobContainerClient {
        BlobContainerClient::new(self.clone(), name)
    }

    pub fn queue_client(&self, name: &str) -> QueueClient {
        QueueClient::new(self.clone(), name)
    }

    pub fn share_client(&self, name: &str) -> ShareClient {
        ShareClient::new(self.clone(), name)
    }

    /// Lightweight `SELECT 1` against the metadata database.
    pub async fn ping(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(self.db()?)
            .await?;
        Ok(())
    }

    /// Write, read back and remove a scratch file under the blob root.
    pub async fn check_disk(&self) -> StorageResult<()> {
        let tmp_path = self.blob_root()?.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(StorageError::Io(std::io::Error::other(
                "scratch file content mismatch",
            )));
        }
        Ok(())
    }
}

/// Statements of a schema script. `--` comment lines are dropped before
/// splitting on `;`.
fn schema_statements(sql: &str) -> Vec<String> {
    let without_comments = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply the embedded schema. Every statement is idempotent, so this runs on
/// each connect as well as from `--migrate`.
pub async fn run_migrations(db: &SqlitePool) -> StorageResult<usize> {
    let statements = schema_statements(MIGRATION_SQL);

    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt.as_str()).execute(db).await?;
    }

    Ok(statements.len())
}
