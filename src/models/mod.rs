//! Core data models for the retail back office.
//!
//! Customers and products are table entities; orders travel through the
//! order queue; uploaded files and log files are reconstructed from storage
//! properties on every listing. All of them serialize as camelCase JSON.

pub mod customer;
pub mod envelope;
pub mod file;
pub mod order;
pub mod product;
