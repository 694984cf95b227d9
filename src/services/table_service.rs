//! Customer and product CRUD over table storage.

use crate::{
    models::{
        customer::{CUSTOMER_PARTITION, Customer},
        product::{PRODUCT_PARTITION, Product},
    },
    storage::{
        StorageAccount, StorageResult,
        table::{PropertyFilter, TableClient, UpdateCondition},
    },
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub const CUSTOMERS_TABLE: &str = "Customers";
pub const PRODUCTS_TABLE: &str = "Products";

/// Table adapter for the `Customers` and `Products` tables.
///
/// Identities are UUIDs assigned here; partition keys are fixed per entity
/// type. Updates are last-writer-wins unless the entity carries the etag it
/// was read with, in which case a concurrent edit surfaces as `Conflict`.
#[derive(Clone)]
pub struct TableService {
    customers: TableClient,
    products: TableClient,
}

impl TableService {
    /// Build the adapter and make sure both tables exist. A failure here is
    /// logged and otherwise ignored; individual calls will fail later.
    pub async fn new(account: &StorageAccount) -> Self {
        let service = Self {
            customers: account.table_client(CUSTOMERS_TABLE),
            products: account.table_client(PRODUCTS_TABLE),
        };
        for table in [&service.customers, &service.products] {
            match table.create_if_not_exists().await {
                Ok(true) => info!("Created table {}", table.name()),
                Ok(false) => {}
                Err(err) => warn!("Error initializing table {}: {}", table.name(), err),
            }
        }
        service
    }

    fn condition(etag: &Option<String>) -> UpdateCondition {
        match etag {
            Some(etag) if !etag.is_empty() => UpdateCondition::IfMatch(etag.clone()),
            _ => UpdateCondition::Unconditional,
        }
    }

    // --- Customers ---

    pub async fn add_customer(&self, mut customer: Customer) -> StorageResult<Customer> {
        customer.assign_id(Uuid::new_v4().to_string());
        customer.created_date = Utc::now();
        customer.etag = None;
        customer.timestamp = None;
        self.customers.add_entity(&customer).await
    }

    pub async fn get_customer(&self, customer_id: &str) -> StorageResult<Customer> {
        self.customers
            .get_entity(CUSTOMER_PARTITION, customer_id)
            .await
    }

    pub async fn list_customers(&self) -> StorageResult<Vec<Customer>> {
        self.customers
            .query_entities(CUSTOMER_PARTITION, None)
            .await
    }

    /// Replace a customer. `created_date` always keeps its stored value.
    pub async fn update_customer(&self, mut customer: Customer) -> StorageResult<Customer> {
        let id = customer.customer_id.clone();
        customer.assign_id(id);
        let stored = self.get_customer(&customer.customer_id).await?;
        customer.created_date = stored.created_date;
        let condition = Self::condition(&customer.etag);
        self.customers.update_entity(&customer, condition).await
    }

    pub async fn delete_customer(&self, customer_id: &str) -> StorageResult<()> {
        self.customers
            .delete_entity(CUSTOMER_PARTITION, customer_id)
            .await
    }

    // --- Products ---

    pub async fn add_product(&self, mut product: Product) -> StorageResult<Product> {
        product.assign_id(Uuid::new_v4().to_string());
        product.created_date = Utc::now();
        product.etag = None;
        product.timestamp = None;
        self.products.add_entity(&product).await
    }

    pub async fn get_product(&self, product_id: &str) -> StorageResult<Product> {
        self.products
            .get_entity(PRODUCT_PARTITION, product_id)
            .await
    }

    pub async fn list_products(&self) -> StorageResult<Vec<Product>> {
        self.products.query_entities(PRODUCT_PARTITION, None).await
    }

    /// Products whose category equals `category` exactly (case-sensitive).
    pub async fn list_products_by_category(&self, category: &str) -> StorageResult<Vec<Product>> {
        let filter = PropertyFilter {
            property: "category",
            value: category,
        };
        self.products
            .query_entities(PRODUCT_PARTITION, Some(filter))
            .await
    }

    /// Replace a product. `created_date` always keeps its stored value.
    pub async fn update_product(&self, mut product: Product) -> StorageResult<Product> {
        let id = product.product_id.clone();
        product.assign_id(id);
        let stored = self.get_product(&product.product_id).await?;
        product.created_date = stored.created_date;
        let condition = Self::condition(&product.etag);
        self.products.update_entity(&product, condition).await
    }

    pub async fn delete_product(&self, product_id: &str) -> StorageResult<()> {
        self.products
            .delete_entity(PRODUCT_PARTITION, product_id)
            .await
    }
}
