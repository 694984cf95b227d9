//! A catalog product stored in the `Products` table.

use crate::storage::table::TableEntity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every product lives in this one partition.
pub const PRODUCT_PARTITION: &str = "Products";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    /// Identity. Mirrors `row_key`.
    pub product_id: String,
    pub name: String,
    pub description: String,

    /// Unit price as decimal text (e.g. `"100.00"`), never a float.
    pub price: String,

    pub stock_quantity: i32,
    pub category: String,
    pub image_url: String,
    pub is_active: bool,
    pub created_date: DateTime<Utc>,

    pub partition_key: String,
    pub row_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

impl Default for Product {
    fn default() -> Self {
        Self {
            product_id: String::new(),
            name: String::new(),
            description: String::new(),
            price: "0.00".to_string(),
            stock_quantity: 0,
            category: String::new(),
            image_url: String::new(),
            is_active: true,
            created_date: Utc::now(),
            partition_key: PRODUCT_PARTITION.to_string(),
            row_key: String::new(),
            timestamp: None,
            etag: None,
        }
    }
}

impl Product {
    /// Assign identity and keep the table keys in sync with it.
    pub fn assign_id(&mut self, id: impl Into<String>) {
        self.product_id = id.into();
        self.row_key = self.product_id.clone();
        self.partition_key = PRODUCT_PARTITION.to_string();
    }

    /// The unit price as an exact decimal.
    pub fn unit_price(&self) -> Result<Decimal, rust_decimal::Error> {
        Decimal::from_str(self.price.trim())
    }
}

impl TableEntity for Product {
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
