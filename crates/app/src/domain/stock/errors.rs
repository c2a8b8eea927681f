//! Stock ledger errors.

use checkout::prelude::Variant;
use thiserror::Error;

use crate::{domain::catalog::records::ProductUuid, store::StoreError};

#[derive(Debug, Error)]
pub enum StockError {
    #[error("product {0} not found")]
    ProductNotFound(ProductUuid),

    #[error("product {product} has no {variant} variant")]
    VariantNotFound {
        product: ProductUuid,
        variant: Variant,
    },

    #[error("product {0} is not for sale")]
    Inactive(ProductUuid),

    #[error(
        "insufficient stock for {product} ({variant}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product: ProductUuid,
        variant: Variant,
        requested: u32,
        available: u32,
    },

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error(transparent)]
    Store(StoreError),
}
