//! Orders service errors.

use checkout::prelude::{IllegalTransition, PricingError, Variant};
use thiserror::Error;

use crate::{
    domain::{catalog::records::ProductUuid, orders::records::OrderUuid, stock::StockError},
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("shipping address not found")]
    AddressNotFound,

    #[error("product {product} is no longer available")]
    ProductUnavailable { product: ProductUuid },

    #[error("product {product} has no {variant} variant")]
    VariantNotFound {
        product: ProductUuid,
        variant: Variant,
    },

    #[error(
        "insufficient stock for {product} ({variant}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product: ProductUuid,
        variant: Variant,
        requested: u32,
        available: u32,
    },

    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("order {0} kept changing while its status was updated")]
    Conflict(OrderUuid),

    #[error("checkout did not finish in time")]
    TimedOut,

    #[error("checkout failed after partial completion and was compensated: {cause}")]
    PartialFailure {
        #[source]
        cause: Box<OrdersServiceError>,
    },

    #[error("invalid quantity")]
    InvalidQuantity,

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("storage error")]
    Store(#[source] StoreError),
}

impl OrdersServiceError {
    /// The failure behind a compensated checkout, or the error itself.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::PartialFailure { cause } => cause.root_cause(),
            other => other,
        }
    }
}

impl From<StoreError> for OrdersServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

impl From<StockError> for OrdersServiceError {
    fn from(error: StockError) -> Self {
        match error {
            StockError::ProductNotFound(product) | StockError::Inactive(product) => {
                Self::ProductUnavailable { product }
            }
            StockError::VariantNotFound { product, variant } => {
                Self::VariantNotFound { product, variant }
            }
            StockError::InsufficientStock {
                product,
                variant,
                requested,
                available,
            } => Self::InsufficientStock {
                product,
                variant,
                requested,
                available,
            },
            StockError::InvalidQuantity => Self::InvalidQuantity,
            StockError::Store(error) => Self::Store(error),
        }
    }
}
