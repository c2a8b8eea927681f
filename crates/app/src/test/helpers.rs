//! Test Helpers

use checkout::prelude::Variant;

use crate::{
    domain::{
        addresses::records::ShippingAddress,
        carts::data::AddItem,
        catalog::{
            data::{NewProduct, NewStockEntry},
            records::{ProductRecord, ProductUuid, StockEntryUuid},
        },
    },
    store::{CheckoutStore, StoreError},
};

fn new_product(
    price: u64,
    discount_price: Option<u64>,
    active: bool,
    stock: &[(&str, &str, u32)],
) -> NewProduct {
    NewProduct {
        uuid: ProductUuid::new(),
        name: "Organic Cotton Tee".to_string(),
        image: Some("https://cdn.example.com/tee.png".to_string()),
        price,
        discount_price,
        active,
        stock: stock
            .iter()
            .map(|&(size, color, quantity)| NewStockEntry {
                uuid: StockEntryUuid::new(),
                size: size.to_string(),
                color: color.to_string(),
                quantity,
            })
            .collect(),
    }
}

/// Resubmit a product's current record with some changes applied.
fn edit(product: &ProductRecord) -> NewProduct {
    NewProduct {
        uuid: product.uuid,
        name: product.name.clone(),
        image: product.image.clone(),
        price: product.price,
        discount_price: product.discount_price,
        active: product.active,
        stock: product
            .stock
            .iter()
            .map(|entry| NewStockEntry {
                uuid: entry.uuid,
                size: entry.variant.size().to_string(),
                color: entry.variant.color().to_string(),
                quantity: entry.quantity,
            })
            .collect(),
    }
}

pub(crate) async fn seed_product(
    store: &dyn CheckoutStore,
    price: u64,
    discount_price: Option<u64>,
    stock: &[(&str, &str, u32)],
) -> Result<ProductRecord, StoreError> {
    store
        .save_product(new_product(price, discount_price, true, stock))
        .await
}

pub(crate) async fn seed_inactive_product(
    store: &dyn CheckoutStore,
    stock: &[(&str, &str, u32)],
) -> Result<ProductRecord, StoreError> {
    store
        .save_product(new_product(100, None, false, stock))
        .await
}

pub(crate) async fn reprice_product(
    store: &dyn CheckoutStore,
    product: &ProductRecord,
    price: u64,
) -> Result<ProductRecord, StoreError> {
    let mut changed = edit(&store.get_product(product.uuid).await?);

    changed.price = price;
    changed.discount_price = None;

    store.save_product(changed).await
}

/// Set every variant of the product to `quantity`.
pub(crate) async fn restock(
    store: &dyn CheckoutStore,
    product: &ProductRecord,
    quantity: u32,
) -> Result<ProductRecord, StoreError> {
    let mut changed = edit(&store.get_product(product.uuid).await?);

    for entry in &mut changed.stock {
        entry.quantity = quantity;
    }

    store.save_product(changed).await
}

pub(crate) async fn deactivate(
    store: &dyn CheckoutStore,
    product: &ProductRecord,
) -> Result<ProductRecord, StoreError> {
    let mut changed = edit(&store.get_product(product.uuid).await?);

    changed.active = false;

    store.save_product(changed).await
}

pub(crate) fn add(product: ProductUuid, quantity: u32, size: &str, color: &str) -> AddItem {
    AddItem {
        product_uuid: product,
        quantity,
        size: Some(size.to_string()),
        color: Some(color.to_string()),
        idempotency_key: None,
    }
}

pub(crate) fn variant(size: &str, color: &str) -> Variant {
    Variant::new(size, color)
}

pub(crate) fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Lovelace".to_string(),
        phone: "+44 20 7946 0000".to_string(),
        lines: vec!["12 St James's Square".to_string()],
        city: "London".to_string(),
        state: "Greater London".to_string(),
        zip: "SW1Y 4JH".to_string(),
        country: "GB".to_string(),
    }
}
