//! Products Repository

use checkout::prelude::Variant;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};
use uuid::Uuid;

use crate::{
    domain::{
        catalog::{
            data::NewProduct,
            records::{ProductRecord, ProductUuid, StockEntryRecord, StockEntryUuid},
        },
        orders::data::Reservation,
    },
    store::{
        StoreError,
        postgres::rows::{
            to_db_amount, to_db_quantity, try_get_amount, try_get_optional_amount,
            try_get_quantity, try_get_timestamp,
        },
    },
};

const UPSERT_PRODUCT_SQL: &str = include_str!("sql/upsert_product.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const LIST_PRODUCT_STOCK_SQL: &str = include_str!("sql/list_product_stock.sql");
const DELETE_STALE_STOCK_SQL: &str = include_str!("sql/delete_stale_stock.sql");
const UPSERT_STOCK_ENTRY_SQL: &str = include_str!("sql/upsert_stock_entry.sql");
const RESERVE_STOCK_SQL: &str = include_str!("sql/reserve_stock.sql");
const RELEASE_STOCK_SQL: &str = include_str!("sql/release_stock.sql");
const GET_STOCK_QUANTITY_SQL: &str = include_str!("sql/get_stock_quantity.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgProductsRepository;

impl PgProductsRepository {
    /// Create or replace a product; stock entries not listed are removed.
    pub(crate) async fn save_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: &NewProduct,
    ) -> Result<ProductRecord, sqlx::Error> {
        let mut record = query_as::<Postgres, ProductRecord>(UPSERT_PRODUCT_SQL)
            .bind(product.uuid.into_uuid())
            .bind(&product.name)
            .bind(product.image.as_deref())
            .bind(to_db_amount(product.price, "price")?)
            .bind(
                product
                    .discount_price
                    .map(|price| to_db_amount(price, "discount_price"))
                    .transpose()?,
            )
            .bind(product.active)
            .fetch_one(&mut **tx)
            .await?;

        let kept = product
            .stock
            .iter()
            .map(|entry| entry.uuid.into_uuid())
            .collect::<Vec<Uuid>>();

        query(DELETE_STALE_STOCK_SQL)
            .bind(product.uuid.into_uuid())
            .bind(&kept)
            .execute(&mut **tx)
            .await?;

        for entry in &product.stock {
            query(UPSERT_STOCK_ENTRY_SQL)
                .bind(entry.uuid.into_uuid())
                .bind(product.uuid.into_uuid())
                .bind(&entry.size)
                .bind(&entry.color)
                .bind(to_db_quantity(entry.quantity, "quantity")?)
                .execute(&mut **tx)
                .await?;
        }

        record.stock = self.list_stock(tx, product.uuid).await?;

        Ok(record)
    }

    pub(crate) async fn get_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<ProductRecord, sqlx::Error> {
        let mut record = query_as::<Postgres, ProductRecord>(GET_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        record.stock = self.list_stock(tx, product).await?;

        Ok(record)
    }

    async fn list_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<Vec<StockEntryRecord>, sqlx::Error> {
        query_as::<Postgres, StockEntryRecord>(LIST_PRODUCT_STOCK_SQL)
            .bind(product.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Take stock with a single conditional decrement.
    pub(crate) async fn reserve_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        reservation: &Reservation,
    ) -> Result<u32, StoreError> {
        let requested = to_db_quantity(reservation.quantity, "quantity")?;

        let remaining: Option<i32> = query_scalar(RESERVE_STOCK_SQL)
            .bind(reservation.product_uuid.into_uuid())
            .bind(reservation.variant.size())
            .bind(reservation.variant.color())
            .bind(requested)
            .fetch_optional(&mut **tx)
            .await?;

        if let Some(remaining) = remaining {
            return u32::try_from(remaining).map_err(|_| StoreError::InvalidData);
        }

        let available: Option<i32> = query_scalar(GET_STOCK_QUANTITY_SQL)
            .bind(reservation.product_uuid.into_uuid())
            .bind(reservation.variant.size())
            .bind(reservation.variant.color())
            .fetch_optional(&mut **tx)
            .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                requested: reservation.quantity,
                available: u32::try_from(available).map_err(|_| StoreError::InvalidData)?,
            }),
            None => Err(StoreError::NotFound),
        }
    }

    pub(crate) async fn release_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        let remaining: Option<i32> = query_scalar(RELEASE_STOCK_SQL)
            .bind(product.into_uuid())
            .bind(variant.size())
            .bind(variant.color())
            .bind(to_db_quantity(quantity, "quantity")?)
            .fetch_optional(&mut **tx)
            .await?;

        let remaining = remaining.ok_or(StoreError::NotFound)?;

        u32::try_from(remaining).map_err(|_| StoreError::InvalidData)
    }
}

/// Decodes the product row only; stock is loaded separately.
impl<'r> FromRow<'r, PgRow> for ProductRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            price: try_get_amount(row, "price")?,
            discount_price: try_get_optional_amount(row, "discount_price")?,
            active: row.try_get("active")?,
            stock: Vec::new(),
            created_at: try_get_timestamp(row, "created_at")?,
            updated_at: try_get_timestamp(row, "updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for StockEntryRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let size: String = row.try_get("size")?;
        let color: String = row.try_get("color")?;

        Ok(Self {
            uuid: StockEntryUuid::from_uuid(row.try_get("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            variant: Variant::new(size, color),
            quantity: try_get_quantity(row, "quantity")?,
        })
    }
}
