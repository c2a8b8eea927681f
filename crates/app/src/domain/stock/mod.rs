//! Stock
//!
//! Authoritative per-variant availability, and the only place stock quantities change.

pub mod errors;
mod ledger;

pub use errors::StockError;
pub use ledger::*;
