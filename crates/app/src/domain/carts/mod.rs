//! Carts

pub mod cache;
pub mod data;
pub mod errors;
pub mod records;
mod service;
pub mod validation;

pub use cache::ValidationCache;
pub use errors::CartsServiceError;
pub use service::*;
