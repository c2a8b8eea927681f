//! Stock ledger.

use std::sync::Arc;

use checkout::prelude::Variant;
use tracing::debug;

use crate::{
    domain::{
        catalog::records::{ProductRecord, ProductUuid},
        orders::data::Reservation,
        stock::errors::StockError,
    },
    store::{CheckoutStore, CheckoutUnit, StoreError},
};

/// Result of an availability check for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub unit_price: u64,
    pub in_stock: u32,
}

/// How much of a variant is on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStock {
    /// No variant was named, so there is nothing to count.
    Untracked,

    /// The product is not sold in the named variant.
    Missing,

    InStock(u32),
}

impl VariantStock {
    /// Units that can be sold, or `None` when stock is not tracked.
    #[must_use]
    pub fn units(self) -> Option<u32> {
        match self {
            Self::Untracked => None,
            Self::Missing => Some(0),
            Self::InStock(units) => Some(units),
        }
    }
}

/// Current sale facts of one product variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSnapshot {
    pub active: bool,
    pub unit_price: u64,
    pub stock: VariantStock,
}

impl VariantSnapshot {
    #[must_use]
    pub fn of(product: &ProductRecord, variant: Option<&Variant>) -> Self {
        let stock = match variant {
            None => VariantStock::Untracked,
            Some(variant) => product
                .stock_for(variant)
                .map_or(VariantStock::Missing, |entry| {
                    VariantStock::InStock(entry.quantity)
                }),
        };

        Self {
            active: product.active,
            unit_price: product.unit_price(),
            stock,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockLedger {
    store: Arc<dyn CheckoutStore>,
}

impl StockLedger {
    #[must_use]
    pub fn new(store: Arc<dyn CheckoutStore>) -> Self {
        Self { store }
    }

    /// Whether `quantity` units of a variant can be sold right now.
    ///
    /// # Errors
    ///
    /// - [`StockError::ProductNotFound`] / [`StockError::VariantNotFound`]: nothing to check.
    /// - [`StockError::Inactive`]: the product is not for sale.
    #[tracing::instrument(
        name = "stock.ledger.check_availability",
        skip(self),
        fields(product_uuid = %product, variant = %variant),
        err
    )]
    pub async fn check_availability(
        &self,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<Availability, StockError> {
        let record = self.product(product).await?;

        if !record.active {
            return Err(StockError::Inactive(product));
        }

        let entry = record
            .stock_for(variant)
            .ok_or_else(|| StockError::VariantNotFound {
                product,
                variant: variant.clone(),
            })?;

        Ok(Availability {
            available: entry.quantity >= quantity,
            unit_price: record.unit_price(),
            in_stock: entry.quantity,
        })
    }

    /// Read the current sale facts of a variant straight from the store.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::ProductNotFound`] if the product does not exist.
    pub async fn snapshot(
        &self,
        product: ProductUuid,
        variant: Option<&Variant>,
    ) -> Result<VariantSnapshot, StockError> {
        let record = self.product(product).await?;

        Ok(VariantSnapshot::of(&record, variant))
    }

    /// Take stock for one order line inside a checkout. Never lets stock go negative.
    ///
    /// # Errors
    ///
    /// - [`StockError::InsufficientStock`]: not enough units remain; nothing changed.
    /// - [`StockError::VariantNotFound`]: the variant is not stocked.
    #[tracing::instrument(
        name = "stock.ledger.reserve",
        skip(self, unit, reservation),
        fields(
            product_uuid = %reservation.product_uuid,
            variant = %reservation.variant,
            quantity = reservation.quantity
        ),
        err
    )]
    pub async fn reserve(
        &self,
        unit: &mut (dyn CheckoutUnit + '_),
        reservation: &Reservation,
    ) -> Result<u32, StockError> {
        if reservation.quantity == 0 {
            return Err(StockError::InvalidQuantity);
        }

        let remaining = unit
            .reserve_stock(reservation)
            .await
            .map_err(|error| {
                variant_error(error, reservation.product_uuid, &reservation.variant)
            })?;

        debug!(remaining, "reserved stock");

        Ok(remaining)
    }

    /// Return units to a variant's stock.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::VariantNotFound`] if the variant is no longer stocked.
    #[tracing::instrument(
        name = "stock.ledger.release",
        skip(self),
        fields(product_uuid = %product, variant = %variant),
        err
    )]
    pub async fn release(
        &self,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<u32, StockError> {
        if quantity == 0 {
            return Err(StockError::InvalidQuantity);
        }

        self.store
            .release_stock(product, variant, quantity)
            .await
            .map_err(|error| variant_error(error, product, variant))
    }

    async fn product(&self, product: ProductUuid) -> Result<ProductRecord, StockError> {
        self.store
            .get_product(product)
            .await
            .map_err(|error| match error {
                StoreError::NotFound => StockError::ProductNotFound(product),
                other => StockError::Store(other),
            })
    }
}

fn variant_error(error: StoreError, product: ProductUuid, variant: &Variant) -> StockError {
    match error {
        StoreError::NotFound => StockError::VariantNotFound {
            product,
            variant: variant.clone(),
        },
        StoreError::InsufficientStock {
            requested,
            available,
        } => StockError::InsufficientStock {
            product,
            variant: variant.clone(),
            requested,
            available,
        },
        other => StockError::Store(other),
    }
}
