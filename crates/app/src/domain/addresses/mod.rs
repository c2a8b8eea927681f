//! Addresses
//!
//! Saved shipping addresses. Orders copy the address at checkout, so later edits never reach
//! an existing order.

pub mod records;
mod service;

pub use records::{AddressRecord, AddressUuid, NewAddress, ShippingAddress};
pub use service::*;
