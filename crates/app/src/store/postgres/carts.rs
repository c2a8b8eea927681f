//! Carts Repository

use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::{
    domain::{
        carts::{
            data::{CartItemChange, CartItemPrice, NewCartItem},
            records::{CartItemRecord, CartItemUuid, CartRecord, CartUuid},
        },
        catalog::records::ProductUuid,
        users::UserUuid,
    },
    store::postgres::rows::{
        to_db_amount, to_db_quantity, try_get_amount, try_get_quantity, try_get_timestamp,
        try_get_variant, variant_parts,
    },
};

const ENSURE_CART_SQL: &str = include_str!("sql/ensure_cart.sql");
const TOUCH_CART_SQL: &str = include_str!("sql/touch_cart.sql");
const LIST_CART_ITEMS_SQL: &str = include_str!("sql/list_cart_items.sql");
const UPSERT_CART_ITEM_SQL: &str = include_str!("sql/upsert_cart_item.sql");
const FIND_CART_REQUEST_SQL: &str = include_str!("sql/find_cart_request.sql");
const RECORD_CART_REQUEST_SQL: &str = include_str!("sql/record_cart_request.sql");
const UPDATE_CART_ITEM_SQL: &str = include_str!("sql/update_cart_item.sql");
const REPRICE_CART_ITEM_SQL: &str = include_str!("sql/reprice_cart_item.sql");
const DELETE_CART_ITEM_SQL: &str = include_str!("sql/delete_cart_item.sql");
const CLEAR_CART_SQL: &str = include_str!("sql/clear_cart.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgCartsRepository;

impl PgCartsRepository {
    /// The user's cart row, created on first use. Items are not loaded.
    pub(crate) async fn ensure_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<CartRecord, sqlx::Error> {
        query_as::<Postgres, CartRecord>(ENSURE_CART_SQL)
            .bind(CartUuid::new().into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// The user's cart with its items in insertion order.
    pub(crate) async fn load_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<CartRecord, sqlx::Error> {
        let mut cart = self.ensure_cart(tx, user).await?;

        cart.items = self.list_items(tx, cart.uuid).await?;

        Ok(cart)
    }

    pub(crate) async fn touch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
    ) -> Result<(), sqlx::Error> {
        query(TOUCH_CART_SQL)
            .bind(cart.into_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn list_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
    ) -> Result<Vec<CartItemRecord>, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(LIST_CART_ITEMS_SQL)
            .bind(cart.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Insert or merge a line in one statement. `None` means the limit would be exceeded.
    pub(crate) async fn upsert_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        item: &NewCartItem,
        limit: Option<u32>,
    ) -> Result<Option<CartItemRecord>, sqlx::Error> {
        let (size, color) = variant_parts(item.variant.as_ref());

        query_as::<Postgres, CartItemRecord>(UPSERT_CART_ITEM_SQL)
            .bind(item.uuid.into_uuid())
            .bind(cart.into_uuid())
            .bind(item.product_uuid.into_uuid())
            .bind(size)
            .bind(color)
            .bind(to_db_quantity(item.quantity, "quantity")?)
            .bind(to_db_amount(item.unit_price, "unit_price")?)
            .bind(limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)))
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn find_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        key: Uuid,
    ) -> Result<Option<CartItemRecord>, sqlx::Error> {
        query_as::<Postgres, CartItemRecord>(FIND_CART_REQUEST_SQL)
            .bind(user.into_uuid())
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn record_request(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        key: Uuid,
        item: CartItemUuid,
    ) -> Result<(), sqlx::Error> {
        query(RECORD_CART_REQUEST_SQL)
            .bind(user.into_uuid())
            .bind(key)
            .bind(item.into_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Returns whether the line existed.
    pub(crate) async fn update_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        change: &CartItemChange,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(UPDATE_CART_ITEM_SQL)
            .bind(cart.into_uuid())
            .bind(change.item.into_uuid())
            .bind(to_db_quantity(change.quantity, "quantity")?)
            .bind(to_db_amount(change.unit_price, "unit_price")?)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    pub(crate) async fn reprice_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        price: &CartItemPrice,
    ) -> Result<(), sqlx::Error> {
        query(REPRICE_CART_ITEM_SQL)
            .bind(cart.into_uuid())
            .bind(price.item.into_uuid())
            .bind(to_db_amount(price.unit_price, "unit_price")?)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn delete_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
        item: CartItemUuid,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(DELETE_CART_ITEM_SQL)
            .bind(cart.into_uuid())
            .bind(item.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Delete every line, returning what was removed in insertion order.
    pub(crate) async fn clear(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: CartUuid,
    ) -> Result<Vec<CartItemRecord>, sqlx::Error> {
        let mut items = query_as::<Postgres, CartItemRecord>(CLEAR_CART_SQL)
            .bind(cart.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        items.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.uuid.cmp(&b.uuid)));

        self.touch(tx, cart).await?;

        Ok(items)
    }
}

/// Decodes the cart row only; items are loaded separately.
impl<'r> FromRow<'r, PgRow> for CartRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CartUuid::from_uuid(row.try_get("uuid")?),
            user: UserUuid::from_uuid(row.try_get("user_uuid")?),
            items: Vec::new(),
            created_at: try_get_timestamp(row, "created_at")?,
            updated_at: try_get_timestamp(row, "updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CartItemRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CartItemUuid::from_uuid(row.try_get("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            variant: try_get_variant(row)?,
            quantity: try_get_quantity(row, "quantity")?,
            unit_price: try_get_amount(row, "unit_price")?,
            added_at: try_get_timestamp(row, "added_at")?,
            updated_at: try_get_timestamp(row, "updated_at")?,
        })
    }
}
