//! Checkout Domain Concerns

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod stock;
pub mod users;
