//! Ephemeral in-process product catalog.
//!
//! Serves product browsing when table storage is empty or failing. Contents
//! and identity counter reset on restart: `prod-<n>` ids are unique only
//! within one process lifetime, so this must never be promoted to a
//! primary store as-is.

use crate::models::product::Product;
use chrono::Utc;
use dashmap::DashMap;
use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

#[derive(Clone)]
pub struct ProductCache {
    products: Arc<DashMap<String, Product>>,
    next_id: Arc<AtomicU64>,
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCache {
    /// A cache seeded with the three sample products.
    pub fn new() -> Self {
        let cache = Self::empty();
        for product in sample_products() {
            cache.products.insert(product.product_id.clone(), product);
        }
        cache
    }

    pub fn empty() -> Self {
        Self {
            products: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Insert `product` under a fresh `prod-<n>` id.
    pub fn add(&self, mut product: Product) -> Product {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        product.assign_id(format!("prod-{n}"));
        product.created_date = Utc::now();
        self.products
            .insert(product.product_id.clone(), product.clone());
        product
    }

    pub fn get(&self, product_id: &str) -> Option<Product> {
        self.products.get(product_id).map(|entry| entry.clone())
    }

    /// All products, sorted by name.
    pub fn list(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.products.iter().map(|e| e.value().clone()).collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Products in `category`, ignoring ASCII case, sorted by name.
    pub fn list_by_category(&self, category: &str) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .filter(|e| e.category.eq_ignore_ascii_case(category))
            .map(|e| e.value().clone())
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Replace an existing product, keeping its stored `created_date`.
    /// Returns `false` for an unknown id.
    pub fn update(&self, mut product: Product) -> bool {
        match self.products.get_mut(&product.product_id) {
            Some(mut entry) => {
                product.created_date = entry.created_date;
                *entry = product;
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, product_id: &str) -> bool {
        self.products.remove(product_id).is_some()
    }

    /// Distinct non-empty categories, sorted.
    pub fn list_categories(&self) -> Vec<String> {
        self.products
            .iter()
            .filter(|e| !e.category.is_empty())
            .map(|e| e.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn sample_products() -> Vec<Product> {
    [
        ("sample-1", "Sample Product 1", "A sample product for testing", "100.00", 10, "Electronics"),
        ("sample-2", "Sample Product 2", "Another sample product for testing", "50.00", 20, "Clothing"),
        ("sample-3", "Sample Product 3", "A third sample product for testing", "25.00", 15, "Books"),
    ]
    .into_iter()
    .map(|(id, name, description, price, stock, category)| {
        let mut product = Product {
            name: name.to_string(),
            description: description.to_string(),
            price: price.to_string(),
            stock_quantity: stock,
            category: category.to_string(),
            ..Product::default()
        };
        product.assign_id(id);
        product
    })
    .collect()
}
