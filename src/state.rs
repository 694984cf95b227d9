//! Shared handler state.

use crate::{
    config::AppConfig,
    services::{
        blob_service::BlobService, file_service::FileService, product_cache::ProductCache,
        queue_service::QueueService, table_service::TableService,
    },
    storage::StorageAccount,
};

/// One adapter per storage primitive plus the fallback catalog. Every field
/// is a cheap handle, so the state is cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub account: StorageAccount,
    pub tables: TableService,
    pub blobs: BlobService,
    pub queues: QueueService,
    pub files: FileService,
    pub catalog: ProductCache,
}

impl AppState {
    /// Build every adapter over `account`, creating tables and queues that
    /// do not exist yet.
    pub async fn new(account: StorageAccount, cfg: &AppConfig) -> Self {
        Self {
            tables: TableService::new(&account).await,
            blobs: BlobService::new(account.clone(), cfg.public_base_url.clone()),
            queues: QueueService::new(&account, cfg.visibility_timeout).await,
            files: FileService::new(account.clone()),
            catalog: ProductCache::new(),
            account,
        }
    }
}
