//! Product catalog handlers.
//!
//! Reads go to the `Products` table first and fall back to the in-memory
//! catalog when the table is empty or unreachable. Writes go to the table;
//! they land in the catalog only when no storage account is configured, or
//! when they target a product that exists only in the catalog.

use crate::{
    errors::AppError,
    handlers::file_handlers::read_file_form,
    models::{file::FileUpload, product::Product},
    services::StorageResultExt,
    state::AppState,
    storage::StorageError,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const PRODUCT_IMAGES_CONTAINER: &str = "product-images";

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

fn validate(product: &Product) -> Result<(), AppError> {
    if product.name.trim().is_empty() {
        return Err(AppError::bad_request("missing required fields: name"));
    }
    let price = product
        .unit_price()
        .map_err(|_| AppError::bad_request(format!("price `{}` is not a decimal", product.price)))?;
    if price < Decimal::ZERO {
        return Err(AppError::bad_request("price cannot be negative"));
    }
    if product.stock_quantity < 0 {
        return Err(AppError::bad_request("stockQuantity cannot be negative"));
    }
    Ok(())
}

/// Table products (optionally one category), or the catalog when the table
/// yields nothing.
pub(crate) async fn browse_products(state: &AppState, category: Option<&str>) -> Vec<Product> {
    let stored = match category {
        Some(category) => state.tables.list_products_by_category(category).await,
        None => state.tables.list_products().await,
    };
    match stored {
        Ok(products) if !products.is_empty() => products,
        other => {
            if let Err(err) = other {
                warn!(error = %err, "product table unavailable; serving catalog");
            }
            match category {
                Some(category) => state.catalog.list_by_category(category),
                None => state.catalog.list(),
            }
        }
    }
}

/// Look a product up in the table, then in the catalog.
pub(crate) async fn find_product(state: &AppState, product_id: &str) -> Option<Product> {
    let stored = state
        .tables
        .get_product(product_id)
        .await
        .optional()
        .or_degrade(None, "get product");
    stored.or_else(|| state.catalog.get(product_id))
}

/// `GET /products?category=`
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Json<Vec<Product>> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Json(browse_products(&state, category).await)
}

/// `GET /products/categories`: distinct categories across table and catalog.
pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut categories: BTreeSet<String> = state
        .tables
        .list_products()
        .await
        .or_degrade(Vec::new(), "list products")
        .into_iter()
        .map(|p| p.category)
        .filter(|c| !c.is_empty())
        .collect();
    categories.extend(state.catalog.list_categories());
    Json(categories.into_iter().collect())
}

/// `POST /products`
pub async fn create_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> Result<impl IntoResponse, AppError> {
    validate(&product)?;
    let created = match state.tables.add_product(product.clone()).await {
        Ok(created) => created,
        Err(StorageError::NotConfigured) => state.catalog.add(product),
        Err(err) => return Err(err.into()),
    };
    info!(product_id = %created.product_id, price = %created.price, "Created product");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    find_product(&state, &id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("product `{id}` not found")))
}

/// `PUT /products/{id}`: conditional when the body carries an `etag`.
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut product): Json<Product>,
) -> Result<Json<Product>, AppError> {
    if !product.product_id.is_empty() && product.product_id != id {
        return Err(AppError::bad_request(format!(
            "productId `{}` does not match the path id `{}`",
            product.product_id, id
        )));
    }
    product.assign_id(id.clone());
    validate(&product)?;
    match state.tables.update_product(product.clone()).await {
        Ok(updated) => Ok(Json(updated)),
        Err(err @ (StorageError::NotFound { .. } | StorageError::NotConfigured)) => {
            if state.catalog.update(product) {
                state
                    .catalog
                    .get(&id)
                    .map(Json)
                    .ok_or_else(|| AppError::not_found(format!("product `{id}` not found")))
            } else {
                Err(err.into())
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// `DELETE /products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.tables.delete_product(&id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err @ (StorageError::NotFound { .. } | StorageError::NotConfigured)) => {
            if state.catalog.delete(&id) {
                Ok(StatusCode::NO_CONTENT)
            } else {
                Err(err.into())
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// `POST /products/{id}/image` (multipart `file`)
///
/// Stores the image in `product-images` and records its URL on the product.
pub async fn upload_product_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>, AppError> {
    let mut product = find_product(&state, &id)
        .await
        .ok_or_else(|| AppError::not_found(format!("product `{id}` not found")))?;
    let form = read_file_form(multipart).await?;

    let uploaded = state
        .blobs
        .upload(FileUpload {
            file_name: form.file_name,
            container_name: PRODUCT_IMAGES_CONTAINER.to_string(),
            content_type: form.content_type,
            description: product.description.clone(),
            category: product.category.clone(),
            content: form.content,
        })
        .await?;
    product.image_url = uploaded.blob_url;

    // Catalog products never carry an etag.
    if product.etag.is_none() && state.catalog.update(product.clone()) {
        return Ok(Json(state.catalog.get(&id).unwrap_or(product)));
    }
    Ok(Json(state.tables.update_product(product).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_bad_prices_and_stock() {
        let ok = Product {
            name: "Kettle".into(),
            price: "349.99".into(),
            ..Product::default()
        };
        assert!(validate(&ok).is_ok());

        for bad in [
            Product {
                price: "cheap".into(),
                ..ok.clone()
            },
            Product {
                price: "-1.00".into(),
                ..ok.clone()
            },
            Product {
                stock_quantity: -3,
                ..ok.clone()
            },
            Product {
                name: " ".into(),
                ..ok.clone()
            },
        ] {
            assert_eq!(validate(&bad).unwrap_err().status, StatusCode::BAD_REQUEST);
        }
    }
}
