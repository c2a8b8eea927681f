//! Cart Data

use checkout::prelude::Variant;
use uuid::Uuid;

use crate::domain::{
    carts::records::CartItemUuid,
    catalog::records::ProductUuid,
};

/// Item the customer asked to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItem {
    pub product_uuid: ProductUuid,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,

    /// Client-chosen key; a retried request with the same key is applied once.
    pub idempotency_key: Option<Uuid>,
}

/// New quantity for one existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemQuantity {
    pub item: CartItemUuid,
    pub quantity: u32,
}

/// New Cart Item Data, as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub variant: Option<Variant>,
    pub quantity: u32,
    pub unit_price: u64,
    pub idempotency_key: Option<Uuid>,
}

/// Quantity and price to write to an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItemChange {
    pub item: CartItemUuid,
    pub quantity: u32,
    pub unit_price: u64,
}

/// Corrected price for an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItemPrice {
    pub item: CartItemUuid,
    pub unit_price: u64,
}
