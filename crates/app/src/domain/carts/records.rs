//! Cart Records

use checkout::prelude::Variant;
use jiff::Timestamp;

use crate::{
    domain::{catalog::records::ProductUuid, users::UserUuid},
    uuids::TypedUuid,
};

/// Cart UUID
pub type CartUuid = TypedUuid<CartRecord>;

/// Cart Record
///
/// Every user has exactly one cart, created the first time it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct CartRecord {
    pub uuid: CartUuid,
    pub user: UserUuid,
    pub items: Vec<CartItemRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CartRecord {
    #[must_use]
    pub fn item(&self, item: CartItemUuid) -> Option<&CartItemRecord> {
        self.items.iter().find(|line| line.uuid == item)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// Cart Item UUID
pub type CartItemUuid = TypedUuid<CartItemRecord>;

/// Cart Item Record
#[derive(Debug, Clone, PartialEq)]
pub struct CartItemRecord {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub variant: Option<Variant>,
    pub quantity: u32,

    /// Effective unit price captured when the line was last written
    pub unit_price: u64,
    pub added_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CartItemRecord {
    /// Whether this line holds the given product variant.
    #[must_use]
    pub fn holds(&self, product: ProductUuid, variant: Option<&Variant>) -> bool {
        self.product_uuid == product && self.variant.as_ref() == variant
    }
}
