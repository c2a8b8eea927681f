//! Orders Repository

use checkout::prelude::{OrderStatus, OrderTotals, PaymentStatus};
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use rustc_hash::FxHashMap;
use sqlx::{
    FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar,
    types::Json,
};
use uuid::Uuid;

use crate::{
    domain::{
        addresses::records::ShippingAddress,
        catalog::records::ProductUuid,
        orders::{
            data::{NewOrder, ORDER_CREATED_NOTE, OrderQuery, StatusChange},
            number::OrderNumber,
            records::{OrderLineRecord, OrderLineUuid, OrderRecord, OrderUuid, StatusHistoryEntry},
        },
        users::UserUuid,
    },
    store::{
        StoreError,
        postgres::rows::{
            to_db_amount, to_db_quantity, try_get_amount, try_get_optional_amount,
            try_get_optional_timestamp, try_get_parsed, try_get_quantity, try_get_timestamp,
            try_get_variant, variant_parts,
        },
    },
};

const INSERT_ORDER_SQL: &str = include_str!("sql/insert_order.sql");
const INSERT_ORDER_ITEM_SQL: &str = include_str!("sql/insert_order_item.sql");
const INSERT_STATUS_HISTORY_SQL: &str = include_str!("sql/insert_status_history.sql");
const GET_ORDER_SQL: &str = include_str!("sql/get_order.sql");
const GET_ORDER_BY_NUMBER_SQL: &str = include_str!("sql/get_order_by_number.sql");
const LIST_ORDERS_SQL: &str = include_str!("sql/list_orders.sql");
const LIST_ORDER_ITEMS_SQL: &str = include_str!("sql/list_order_items.sql");
const LIST_STATUS_HISTORY_SQL: &str = include_str!("sql/list_status_history.sql");
const CHANGE_ORDER_STATUS_SQL: &str = include_str!("sql/change_order_status.sql");
const ORDER_EXISTS_SQL: &str = include_str!("sql/order_exists.sql");
const UPDATE_PAYMENT_STATUS_SQL: &str = include_str!("sql/update_payment_status.sql");

/// An order line tagged with the order it belongs to.
struct OrderLineRow {
    order_uuid: Uuid,
    line: OrderLineRecord,
}

struct StatusHistoryRow {
    order_uuid: Uuid,
    entry: StatusHistoryEntry,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    /// Insert an order with its lines and first history entry.
    ///
    /// A taken order number yields [`StoreError::AlreadyExists`] without aborting the
    /// transaction.
    pub(crate) async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder,
    ) -> Result<OrderRecord, StoreError> {
        let totals = &order.totals;

        let inserted: Option<Uuid> = query_scalar(INSERT_ORDER_SQL)
            .bind(order.uuid.into_uuid())
            .bind(order.order_number.as_str())
            .bind(order.user.into_uuid())
            .bind(Json(&order.shipping_address))
            .bind(order.payment_method.as_str())
            .bind(PaymentStatus::Pending.as_str())
            .bind(OrderStatus::INITIAL.as_str())
            .bind(to_db_amount(totals.items_total, "items_total")?)
            .bind(to_db_amount(totals.shipping_charge, "shipping_charge")?)
            .bind(to_db_amount(totals.tax, "tax")?)
            .bind(to_db_amount(totals.total_amount, "total_amount")?)
            .bind(order.notes.as_deref())
            .bind(SqlxTimestamp::from(order.created_at))
            .fetch_optional(&mut **tx)
            .await?;

        if inserted.is_none() {
            return Err(StoreError::AlreadyExists);
        }

        for (position, line) in order.items.iter().enumerate() {
            let (size, color) = variant_parts(line.variant.as_ref());

            query(INSERT_ORDER_ITEM_SQL)
                .bind(line.uuid.into_uuid())
                .bind(order.uuid.into_uuid())
                .bind(i32::try_from(position).map_err(|_| StoreError::InvalidData)?)
                .bind(line.product_uuid.into_uuid())
                .bind(&line.name)
                .bind(line.image.as_deref())
                .bind(size)
                .bind(color)
                .bind(to_db_quantity(line.quantity, "quantity")?)
                .bind(to_db_amount(line.price, "price")?)
                .bind(
                    line.discount_price
                        .map(|price| to_db_amount(price, "discount_price"))
                        .transpose()?,
                )
                .bind(to_db_amount(line.unit_price, "unit_price")?)
                .execute(&mut **tx)
                .await?;
        }

        self.append_history(
            tx,
            order.uuid,
            OrderStatus::INITIAL,
            Some(ORDER_CREATED_NOTE),
            order.created_at,
        )
        .await?;

        Ok(order.to_record())
    }

    async fn append_history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        status: OrderStatus,
        note: Option<&str>,
        at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        query(INSERT_STATUS_HISTORY_SQL)
            .bind(order.into_uuid())
            .bind(status.as_str())
            .bind(note)
            .bind(SqlxTimestamp::from(at))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn get_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        let record = query_as::<Postgres, OrderRecord>(GET_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        self.hydrate_one(tx, record).await
    }

    pub(crate) async fn get_order_by_number(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        number: &OrderNumber,
    ) -> Result<OrderRecord, sqlx::Error> {
        let record = query_as::<Postgres, OrderRecord>(GET_ORDER_BY_NUMBER_SQL)
            .bind(number.as_str())
            .fetch_one(&mut **tx)
            .await?;

        self.hydrate_one(tx, record).await
    }

    pub(crate) async fn list_orders(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        filter: &OrderQuery,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let records = query_as::<Postgres, OrderRecord>(LIST_ORDERS_SQL)
            .bind(filter.user.map(UserUuid::into_uuid))
            .bind(filter.status.map(OrderStatus::as_str))
            .bind(i64::from(filter.effective_limit()))
            .bind(i64::from(filter.offset))
            .fetch_all(&mut **tx)
            .await?;

        self.hydrate(tx, records).await
    }

    async fn hydrate_one(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: OrderRecord,
    ) -> Result<OrderRecord, sqlx::Error> {
        let mut hydrated = self.hydrate(tx, vec![record]).await?;

        hydrated.pop().ok_or(sqlx::Error::RowNotFound)
    }

    /// Attach lines and history to order rows.
    async fn hydrate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut records: Vec<OrderRecord>,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        if records.is_empty() {
            return Ok(records);
        }

        let uuids = records
            .iter()
            .map(|record| record.uuid.into_uuid())
            .collect::<Vec<_>>();

        let lines = query_as::<Postgres, OrderLineRow>(LIST_ORDER_ITEMS_SQL)
            .bind(&uuids)
            .fetch_all(&mut **tx)
            .await?;

        let history = query_as::<Postgres, StatusHistoryRow>(LIST_STATUS_HISTORY_SQL)
            .bind(&uuids)
            .fetch_all(&mut **tx)
            .await?;

        let mut by_order: FxHashMap<Uuid, &mut OrderRecord> = records
            .iter_mut()
            .map(|record| (record.uuid.into_uuid(), record))
            .collect();

        for row in lines {
            if let Some(record) = by_order.get_mut(&row.order_uuid) {
                record.items.push(row.line);
            }
        }

        for row in history {
            if let Some(record) = by_order.get_mut(&row.order_uuid) {
                record.status_history.push(row.entry);
            }
        }

        Ok(records)
    }

    /// Apply a status change if the order is still in `expected`, appending its history entry.
    pub(crate) async fn change_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> Result<(), StoreError> {
        let changed: Option<Uuid> = query_scalar(CHANGE_ORDER_STATUS_SQL)
            .bind(order.into_uuid())
            .bind(expected.as_str())
            .bind(change.status.as_str())
            .bind(change.payment_status.map(PaymentStatus::as_str))
            .bind(change.paid_at.map(SqlxTimestamp::from))
            .bind(change.delivered_at.map(SqlxTimestamp::from))
            .bind(change.cancelled_at.map(SqlxTimestamp::from))
            .bind(change.cancellation_reason.as_deref())
            .bind(SqlxTimestamp::from(change.at))
            .fetch_optional(&mut **tx)
            .await?;

        if changed.is_none() {
            let exists: bool = query_scalar(ORDER_EXISTS_SQL)
                .bind(order.into_uuid())
                .fetch_one(&mut **tx)
                .await?;

            return Err(if exists {
                StoreError::Conflict
            } else {
                StoreError::NotFound
            });
        }

        self.append_history(
            tx,
            order,
            change.status,
            change.note.as_deref(),
            change.at,
        )
        .await?;

        Ok(())
    }

    /// Returns whether the order exists.
    pub(crate) async fn update_payment_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        status: PaymentStatus,
        paid_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(UPDATE_PAYMENT_STATUS_SQL)
            .bind(order.into_uuid())
            .bind(status.as_str())
            .bind(paid_at.map(SqlxTimestamp::from))
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}

/// Decodes the order row only; lines and history are attached by the repository.
impl<'r> FromRow<'r, PgRow> for OrderRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let Json(shipping_address) = row.try_get::<Json<ShippingAddress>, _>("shipping_address")?;

        Ok(Self {
            uuid: OrderUuid::from_uuid(row.try_get("uuid")?),
            order_number: try_get_parsed(row, "order_number")?,
            user: UserUuid::from_uuid(row.try_get("user_uuid")?),
            items: Vec::new(),
            shipping_address,
            payment_method: try_get_parsed(row, "payment_method")?,
            payment_status: try_get_parsed(row, "payment_status")?,
            status: try_get_parsed(row, "status")?,
            status_history: Vec::new(),
            totals: OrderTotals {
                items_total: try_get_amount(row, "items_total")?,
                shipping_charge: try_get_amount(row, "shipping_charge")?,
                tax: try_get_amount(row, "tax")?,
                total_amount: try_get_amount(row, "total_amount")?,
            },
            notes: row.try_get("notes")?,
            cancellation_reason: row.try_get("cancellation_reason")?,
            paid_at: try_get_optional_timestamp(row, "paid_at")?,
            delivered_at: try_get_optional_timestamp(row, "delivered_at")?,
            cancelled_at: try_get_optional_timestamp(row, "cancelled_at")?,
            created_at: try_get_timestamp(row, "created_at")?,
            updated_at: try_get_timestamp(row, "updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderLineRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            order_uuid: row.try_get("order_uuid")?,
            line: OrderLineRecord {
                uuid: OrderLineUuid::from_uuid(row.try_get("uuid")?),
                product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
                name: row.try_get("name")?,
                image: row.try_get("image")?,
                variant: try_get_variant(row)?,
                quantity: try_get_quantity(row, "quantity")?,
                price: try_get_amount(row, "price")?,
                discount_price: try_get_optional_amount(row, "discount_price")?,
                unit_price: try_get_amount(row, "unit_price")?,
            },
        })
    }
}

impl<'r> FromRow<'r, PgRow> for StatusHistoryRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            order_uuid: row.try_get("order_uuid")?,
            entry: StatusHistoryEntry {
                status: try_get_parsed(row, "status")?,
                note: row.try_get("note")?,
                at: try_get_timestamp(row, "created_at")?,
            },
        })
    }
}
