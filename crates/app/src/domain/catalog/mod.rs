//! Catalog
//!
//! Products and their per-variant stock. The catalog is maintained elsewhere; checkout reads it
//! and adjusts stock quantities.

pub mod data;
pub mod records;

pub use data::{NewProduct, NewStockEntry};
pub use records::{ProductRecord, ProductUuid, StockEntryRecord, StockEntryUuid};
