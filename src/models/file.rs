//! File upload input and the descriptive records rebuilt from storage.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A file received from a client, ready to be stored as a blob.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub container_name: String,
    pub content_type: Option<String>,
    pub description: String,
    pub category: String,
    pub content: Bytes,
}

/// Descriptive record of a stored blob. Not persisted; rebuilt from blob
/// properties and metadata on each listing.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_name: String,
    pub container_name: String,
    pub blob_url: String,
    pub file_size: i64,
    pub content_type: String,
    pub upload_date: DateTime<Utc>,
    pub description: String,
    pub category: String,
}

/// A text log stored on a file share.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogFile {
    pub file_name: String,
    pub share_name: String,
    /// Always `/`; logs sit at the share root.
    pub directory_path: String,
    pub file_path: String,
    pub file_size: i64,
    pub last_modified: DateTime<Utc>,
    pub content: String,
}
