//! Local storage account backing the four storage primitives.
//!
//! Tables, queues and blob properties live in SQLite; blob payloads and file
//! shares live on disk beneath the roots named by the connection string. The
//! clients in this module mirror the shape of a managed cloud storage SDK
//! (create-if-not-exists, version tags, visibility windows, pop receipts) so
//! the service adapters above them only have to map entities and messages.

pub mod account;
pub mod blob;
pub mod queue;
pub mod share;
pub mod table;

pub use account::StorageAccount;

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} `{name}` not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{kind} `{name}` already exists")]
    AlreadyExists { kind: &'static str, name: String },
    #[error("{kind} `{name}` was modified by another writer (etag mismatch)")]
    Conflict { kind: &'static str, name: String },
    #[error("{kind} name `{name}` invalid: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
    #[error("storage account is not configured")]
    NotConfigured,
    #[error("message `{message_id}` has a malformed body: {source}")]
    Malformed {
        message_id: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    fn invalid_name(kind: &'static str, name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            kind,
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Provider-side failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Sqlx(_) | Self::Io(_))
    }
}

const MAX_ITEM_NAME_LEN: usize = 1024;
const RESOURCE_NAME_MIN_LEN: usize = 3;
const RESOURCE_NAME_MAX_LEN: usize = 63;

/// Validate a container, queue or share name.
///
/// 3–63 characters of lowercase letters, digits and single hyphens, starting
/// and ending with a letter or digit. These names become directory names on
/// disk, so nothing else gets through.
pub(crate) fn ensure_resource_name(kind: &'static str, name: &str) -> StorageResult<()> {
    let len = name.len();
    if !(RESOURCE_NAME_MIN_LEN..=RESOURCE_NAME_MAX_LEN).contains(&len) {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "must be between 3 and 63 characters",
        ));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
    {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "allowed characters are lowercase letters, digits and hyphens",
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "must start and end with a letter or digit",
        ));
    }

    if name.contains("--") {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "cannot contain consecutive hyphens",
        ));
    }

    Ok(())
}

/// Table names are alphanumeric and start with a letter.
pub(crate) fn ensure_table_name(name: &str) -> StorageResult<()> {
    let len = name.len();
    if !(RESOURCE_NAME_MIN_LEN..=RESOURCE_NAME_MAX_LEN).contains(&len) {
        return Err(StorageError::invalid_name(
            "table",
            name,
            "must be between 3 and 63 characters",
        ));
    }
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(StorageError::invalid_name(
            "table",
            name,
            "must be alphanumeric and start with a letter",
        ));
    }
    Ok(())
}

/// Validate a blob or share file name. Items sit flat at the root of their
/// container or share, so separators and traversal segments are rejected.
pub(crate) fn ensure_item_name(kind: &'static str, name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::invalid_name(kind, name, "cannot be empty"));
    }
    if name.len() > MAX_ITEM_NAME_LEN {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "cannot exceed 1024 bytes",
        ));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "cannot contain path separators or `..`",
        ));
    }
    if name == "." {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "cannot name the directory itself",
        ));
    }
    if name.starts_with(".tmp-") {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "the `.tmp-` prefix is reserved",
        ));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(StorageError::invalid_name(
            kind,
            name,
            "cannot contain control characters",
        ));
    }
    Ok(())
}
