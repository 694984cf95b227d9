//! An order as carried on the `orders` queue.

use super::{customer::Customer, product::Product};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

/// Queue message body. Field names are the wire format, so they stay
/// camelCase; `totalAmount` is written as decimal text and read from either
/// text or a JSON number.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    /// Denormalized "First Last" captured when the order was placed.
    pub customer_name: String,
    pub product_id: String,
    /// Denormalized product name captured when the order was placed.
    pub product_name: String,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: String,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            order_id: Uuid::new_v4().to_string(),
            customer_id: String::new(),
            customer_name: String::new(),
            product_id: String::new(),
            product_name: String::new(),
            quantity: 0,
            total_amount: Decimal::ZERO,
            order_date: Utc::now(),
            status: OrderStatus::Pending,
            shipping_address: String::new(),
            payment_method: String::new(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("product `{product_id}` has an unreadable price `{price}`")]
    InvalidPrice { product_id: String, price: String },
    #[error("order total overflows for quantity {0}")]
    Overflow(i32),
}

/// What a client supplies when placing an order. Anything else on the order
/// (names, total, status) is filled in from storage.
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    pub quantity: i32,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: String,
}

impl Order {
    /// Build a pending order, denormalizing names and pricing it from the
    /// product's current unit price.
    pub fn place(
        draft: OrderDraft,
        customer: &Customer,
        product: &Product,
    ) -> Result<Self, PricingError> {
        let unit_price = product
            .unit_price()
            .map_err(|_| PricingError::InvalidPrice {
                product_id: product.product_id.clone(),
                price: product.price.clone(),
            })?;
        let total_amount = unit_price
            .checked_mul(Decimal::from(draft.quantity))
            .ok_or(PricingError::Overflow(draft.quantity))?;

        Ok(Self {
            customer_id: customer.customer_id.clone(),
            customer_name: customer.full_name(),
            product_id: product.product_id.clone(),
            product_name: product.name.clone(),
            quantity: draft.quantity,
            total_amount,
            status: OrderStatus::Pending,
            shipping_address: draft.shipping_address,
            payment_method: draft.payment_method,
            notes: draft.notes,
            ..Self::default()
        })
    }
}
