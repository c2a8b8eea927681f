//! Cart validation results and summaries.

use checkout::prelude::{OrderTotals, Variant};

use crate::domain::{
    carts::{
        errors::CartsServiceError,
        records::{CartItemUuid, CartRecord},
    },
    catalog::records::ProductUuid,
};

/// Problem found with one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartIssue {
    pub item: CartItemUuid,
    pub product: ProductUuid,
    pub variant: Option<Variant>,
    pub kind: CartIssueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartIssueKind {
    /// The product was removed or deactivated.
    Unavailable,

    /// The snapshot price differs from the current effective price.
    PriceChange { previous: u64, current: u64 },

    /// The variant has no stock left.
    OutOfStock,

    /// The variant has some, but fewer units than the line asks for.
    InsufficientStock { requested: u32, available: u32 },
}

impl CartIssueKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::PriceChange { .. } => "price_change",
            Self::OutOfStock => "out_of_stock",
            Self::InsufficientStock { .. } => "insufficient_stock",
        }
    }
}

/// Outcome of re-validating a cart against current catalog data.
#[derive(Debug, Clone, PartialEq)]
pub struct CartValidation {
    /// The cart with corrected snapshot prices
    pub cart: CartRecord,
    pub issues: Vec<CartIssue>,
}

impl CartValidation {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// The validated cart, provided no issue was found.
    ///
    /// # Errors
    ///
    /// Returns [`CartsServiceError::ValidationConflict`] listing every issue otherwise.
    pub fn ensure_clean(self) -> Result<CartRecord, CartsServiceError> {
        if self.issues.is_empty() {
            Ok(self.cart)
        } else {
            Err(CartsServiceError::ValidationConflict(self.issues))
        }
    }
}

/// Cart figures computed from the snapshot prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub line_count: usize,
    pub item_count: u64,

    /// What an order placed now would cost, before re-validation
    pub estimate: OrderTotals,
}
