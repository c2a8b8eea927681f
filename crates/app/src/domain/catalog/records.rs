//! Catalog Records

use checkout::prelude::{Variant, effective_unit_price};
use jiff::Timestamp;

use crate::uuids::TypedUuid;

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Product Record
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub image: Option<String>,
    pub price: u64,
    pub discount_price: Option<u64>,
    pub active: bool,
    pub stock: Vec<StockEntryRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProductRecord {
    /// The price a customer pays for one unit right now.
    #[must_use]
    pub fn unit_price(&self) -> u64 {
        effective_unit_price(self.price, self.discount_price)
    }

    /// Stock entry for one variant, if the product is sold in it.
    #[must_use]
    pub fn stock_for(&self, variant: &Variant) -> Option<&StockEntryRecord> {
        self.stock.iter().find(|entry| &entry.variant == variant)
    }
}

/// Stock Entry UUID
pub type StockEntryUuid = TypedUuid<StockEntryRecord>;

/// Stock Entry Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockEntryRecord {
    pub uuid: StockEntryUuid,
    pub product_uuid: ProductUuid,
    pub variant: Variant,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: u64, discount_price: Option<u64>) -> ProductRecord {
        let uuid = ProductUuid::new();

        ProductRecord {
            uuid,
            name: "Tee".to_string(),
            image: None,
            price,
            discount_price,
            active: true,
            stock: vec![StockEntryRecord {
                uuid: StockEntryUuid::new(),
                product_uuid: uuid,
                variant: Variant::new("M", "Red"),
                quantity: 3,
            }],
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn unit_price_uses_discount_when_lower() {
        assert_eq!(product(100, Some(80)).unit_price(), 80);
        assert_eq!(product(100, Some(150)).unit_price(), 100);
    }

    #[test]
    fn stock_lookup_matches_size_and_color() {
        let product = product(100, None);

        assert_eq!(
            product
                .stock_for(&Variant::new("M", "Red"))
                .map(|entry| entry.quantity),
            Some(3)
        );
        assert!(product.stock_for(&Variant::new("M", "Blue")).is_none());
    }
}
