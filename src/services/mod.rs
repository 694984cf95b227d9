//! Storage adapters used by the HTTP handlers, plus the in-memory fallback
//! catalog.
//!
//! Every adapter call returns a [`StorageResult`]; handlers decide per call
//! site whether a failure is surfaced or downgraded to a default through
//! [`StorageResultExt`].

pub mod blob_service;
pub mod file_service;
pub mod product_cache;
pub mod queue_service;
pub mod table_service;

use crate::storage::{StorageError, StorageResult};
use tracing::warn;

pub trait StorageResultExt<T> {
    /// Log the failure and fall back to `default`.
    fn or_degrade(self, default: T, operation: &str) -> T;

    /// Turn `NotFound` into `Ok(None)`, keeping every other error.
    fn optional(self) -> StorageResult<Option<T>>;
}

impl<T> StorageResultExt<T> for StorageResult<T> {
    fn or_degrade(self, default: T, operation: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!(operation, error = %err, transient = err.is_transient(), "storage call failed; using default");
                default
            }
        }
    }

    fn optional(self) -> StorageResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
