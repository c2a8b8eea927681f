//! Carts service errors.

use checkout::prelude::{PricingError, Variant};
use thiserror::Error;

use crate::{
    domain::{
        carts::{records::CartItemUuid, validation::CartIssue},
        catalog::records::ProductUuid,
        stock::StockError,
    },
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum CartsServiceError {
    #[error("cart item not found")]
    ItemNotFound,

    #[error("product {0} not found")]
    ProductNotFound(ProductUuid),

    #[error("product {product} has no {variant} variant")]
    VariantNotFound {
        product: ProductUuid,
        variant: Variant,
    },

    #[error("product {0} is not for sale")]
    ProductUnavailable(ProductUuid),

    #[error(
        "insufficient stock for {product}{}: requested {requested}, available {available}",
        variant_label(.variant.as_ref())
    )]
    InsufficientStock {
        product: ProductUuid,
        variant: Option<Variant>,
        requested: u32,
        available: u32,
    },

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("item {0} appears more than once in the update")]
    DuplicateItem(CartItemUuid),

    #[error("cart has {} validation issue(s)", .0.len())]
    ValidationConflict(Vec<CartIssue>),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("storage error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for CartsServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::ItemNotFound,
            other => Self::Store(other),
        }
    }
}

impl From<StockError> for CartsServiceError {
    fn from(error: StockError) -> Self {
        match error {
            StockError::ProductNotFound(product) => Self::ProductNotFound(product),
            StockError::VariantNotFound { product, variant } => {
                Self::VariantNotFound { product, variant }
            }
            StockError::Inactive(product) => Self::ProductUnavailable(product),
            StockError::InsufficientStock {
                product,
                variant,
                requested,
                available,
            } => Self::InsufficientStock {
                product,
                variant: Some(variant),
                requested,
                available,
            },
            StockError::InvalidQuantity => Self::InvalidQuantity,
            StockError::Store(error) => Self::Store(error),
        }
    }
}

fn variant_label(variant: Option<&Variant>) -> String {
    variant.map_or_else(String::new, |variant| format!(" ({variant})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_names_the_variant_when_there_is_one() {
        let product = ProductUuid::new();

        let with_variant = CartsServiceError::InsufficientStock {
            product,
            variant: Some(Variant::new("M", "Red")),
            requested: 4,
            available: 3,
        };
        let without_variant = CartsServiceError::InsufficientStock {
            product,
            variant: None,
            requested: 4,
            available: 3,
        };

        assert_eq!(
            with_variant.to_string(),
            format!("insufficient stock for {product} (M/Red): requested 4, available 3")
        );
        assert_eq!(
            without_variant.to_string(),
            format!("insufficient stock for {product}: requested 4, available 3")
        );
    }
}
