//! A customer record stored in the `Customers` table.

use crate::storage::table::TableEntity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every customer lives in this one partition.
pub const CUSTOMER_PARTITION: &str = "Customers";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    /// Identity, assigned by the table adapter on add. Mirrors `row_key`.
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,

    /// Set once when the customer is added.
    pub created_date: DateTime<Utc>,

    pub partition_key: String,
    pub row_key: String,

    /// Time of the last write, supplied by storage.
    pub timestamp: Option<DateTime<Utc>>,
    /// Opaque version tag, supplied by storage.
    pub etag: Option<String>,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            customer_id: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            created_date: Utc::now(),
            partition_key: CUSTOMER_PARTITION.to_string(),
            row_key: String::new(),
            timestamp: None,
            etag: None,
        }
    }
}

impl Customer {
    /// Assign identity and keep the table keys in sync with it.
    pub fn assign_id(&mut self, id: impl Into<String>) {
        self.customer_id = id.into();
        self.row_key = self.customer_id.clone();
        self.partition_key = CUSTOMER_PARTITION.to_string();
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl TableEntity for Customer {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }

    fn set_system_properties(&mut self, etag: String, timestamp: DateTime<Utc>) {
        self.etag = Some(etag);
        self.timestamp = Some(timestamp);
    }
}
