//! HTTP handlers, one module per resource family.

pub mod customer_handlers;
pub mod file_handlers;
pub mod health_handlers;
pub mod order_handlers;
pub mod product_handlers;
