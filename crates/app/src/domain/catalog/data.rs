//! Catalog Data

use checkout::prelude::Variant;
use serde::Deserialize;

use crate::domain::catalog::records::{ProductUuid, StockEntryUuid};

/// New or replacement product, including its full stock table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: u64,
    #[serde(default)]
    pub discount_price: Option<u64>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub stock: Vec<NewStockEntry>,
}

/// Stock held for one variant of a new product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewStockEntry {
    #[serde(default)]
    pub uuid: StockEntryUuid,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

impl NewStockEntry {
    #[must_use]
    pub fn variant(&self) -> Variant {
        Variant::new(self.size.as_str(), self.color.as_str())
    }
}

fn default_active() -> bool {
    true
}
