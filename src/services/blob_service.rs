//! File uploads over blob storage, with descriptive metadata per blob.

use super::StorageResultExt;
use crate::{
    models::file::{FileUpload, UploadedFile},
    storage::{
        StorageAccount, StorageResult,
        blob::{BlobContainerClient, BlobProperties, PublicAccess},
    },
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::try_join_all;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashMap;
use tokio::fs::File;
use tracing::info;

pub const META_DESCRIPTION: &str = "Description";
pub const META_CATEGORY: &str = "Category";
pub const META_UPLOAD_DATE: &str = "UploadDate";
pub const META_ORIGINAL_FILE_NAME: &str = "OriginalFileName";

pub(crate) const URL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Clone)]
pub struct BlobService {
    account: StorageAccount,
    public_base_url: String,
}

impl BlobService {
    pub fn new(account: StorageAccount, public_base_url: impl Into<String>) -> Self {
        Self {
            account,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn container(&self, container: &str) -> BlobContainerClient {
        self.account.container_client(container)
    }

    /// Public URL of a blob as served by this application.
    pub fn file_url(&self, file_name: &str, container: &str) -> String {
        format!(
            "{}/files/blobs/{}/{}",
            self.public_base_url,
            utf8_percent_encode(container, URL_SEGMENT),
            utf8_percent_encode(file_name, URL_SEGMENT)
        )
    }

    fn describe(&self, container: &str, props: BlobProperties) -> UploadedFile {
        let meta = |key: &str| props.metadata.get(key).cloned().unwrap_or_default();
        let upload_date = props
            .metadata
            .get(META_UPLOAD_DATE)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|date| date.with_timezone(&Utc))
            .unwrap_or(props.last_modified);
        UploadedFile {
            blob_url: self.file_url(&props.name, container),
            file_name: props.name.clone(),
            container_name: container.to_string(),
            file_size: props.size_bytes,
            content_type: props.content_type.clone(),
            upload_date,
            description: meta(META_DESCRIPTION),
            category: meta(META_CATEGORY),
        }
    }

    /// Store `upload` under its original file name in its container.
    ///
    /// The container is created with public-read access when missing. An
    /// existing blob with the same name is replaced.
    pub async fn upload(&self, upload: FileUpload) -> StorageResult<UploadedFile> {
        self.create_container(&upload.container_name).await?;
        let container = self.container(&upload.container_name);

        let content_type = upload.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&upload.file_name)
                .first_or_octet_stream()
                .to_string()
        });
        let metadata = HashMap::from([
            (META_DESCRIPTION.to_string(), upload.description),
            (META_CATEGORY.to_string(), upload.category),
            (
                META_UPLOAD_DATE.to_string(),
                Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            (META_ORIGINAL_FILE_NAME.to_string(), upload.file_name.clone()),
        ]);
        let props = container
            .upload(&upload.file_name, upload.content, &content_type, &metadata, true)
            .await?;
        info!(
            file_name = %upload.file_name,
            container = %upload.container_name,
            size = props.size_bytes,
            "Uploaded file"
        );
        Ok(self.describe(&upload.container_name, props))
    }

    /// Descriptive record plus an open handle at the start of the payload.
    pub async fn download(
        &self,
        file_name: &str,
        container: &str,
    ) -> StorageResult<(UploadedFile, File)> {
        let (props, file) = self.container(container).open_read(file_name).await?;
        Ok((self.describe(container, props), file))
    }

    /// Every blob in `container`, in name order. Blobs deleted while the
    /// listing runs are skipped.
    pub async fn list(&self, container: &str) -> StorageResult<Vec<UploadedFile>> {
        let client = self.container(container);
        let names = client.list_blob_names().await?;
        self.describe_all(&client, container, &names).await
    }

    async fn describe_all(
        &self,
        client: &BlobContainerClient,
        container: &str,
        names: &[String],
    ) -> StorageResult<Vec<UploadedFile>> {
        let props = try_join_all(
            names
                .iter()
                .map(|name| async move { client.properties(name).await.optional() }),
        )
        .await?;
        Ok(props
            .into_iter()
            .flatten()
            .map(|props| self.describe(container, props))
            .collect())
    }

    pub async fn delete(&self, file_name: &str, container: &str) -> StorageResult<bool> {
        self.container(container).delete_if_exists(file_name).await
    }

    pub async fn container_exists(&self, container: &str) -> StorageResult<bool> {
        self.container(container).exists().await
    }

    /// Create `container` with public-read access if missing. Returns `true`
    /// when it was created by this call.
    pub async fn create_container(&self, container: &str) -> StorageResult<bool> {
        self.container(container)
            .create_if_not_exists(PublicAccess::Blob)
            .await
    }
}
