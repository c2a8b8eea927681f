//! Compensations Repository

use checkout::prelude::Variant;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    domain::{
        catalog::records::ProductUuid,
        orders::{
            data::NewCompensation,
            records::{CompensationRecord, CompensationUuid, OrderUuid},
        },
    },
    store::postgres::rows::{
        to_db_quantity, try_get_optional_timestamp, try_get_quantity, try_get_timestamp,
    },
};

const INSERT_COMPENSATION_SQL: &str = include_str!("sql/insert_compensation.sql");
const PENDING_COMPENSATIONS_SQL: &str = include_str!("sql/pending_compensations.sql");
const LOCK_COMPENSATION_SQL: &str = include_str!("sql/lock_compensation.sql");
const SETTLE_COMPENSATION_SQL: &str = include_str!("sql/settle_compensation.sql");
const RECORD_COMPENSATION_FAILURE_SQL: &str = include_str!("sql/record_compensation_failure.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgCompensationsRepository;

impl PgCompensationsRepository {
    pub(crate) async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        compensation: &NewCompensation,
        at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        query(INSERT_COMPENSATION_SQL)
            .bind(compensation.uuid.into_uuid())
            .bind(order.into_uuid())
            .bind(compensation.product_uuid.into_uuid())
            .bind(compensation.variant.size())
            .bind(compensation.variant.color())
            .bind(to_db_quantity(compensation.quantity, "quantity")?)
            .bind(SqlxTimestamp::from(at))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: Option<OrderUuid>,
        limit: u32,
    ) -> Result<Vec<CompensationRecord>, sqlx::Error> {
        query_as::<Postgres, CompensationRecord>(PENDING_COMPENSATIONS_SQL)
            .bind(order.map(OrderUuid::into_uuid))
            .bind(i64::from(limit))
            .fetch_all(&mut **tx)
            .await
    }

    /// Read a compensation and hold its row lock until the transaction ends.
    pub(crate) async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        compensation: CompensationUuid,
    ) -> Result<CompensationRecord, sqlx::Error> {
        query_as::<Postgres, CompensationRecord>(LOCK_COMPENSATION_SQL)
            .bind(compensation.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn mark_settled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        compensation: CompensationUuid,
    ) -> Result<CompensationRecord, sqlx::Error> {
        query_as::<Postgres, CompensationRecord>(SETTLE_COMPENSATION_SQL)
            .bind(compensation.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Returns whether the compensation exists.
    pub(crate) async fn record_failure(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        compensation: CompensationUuid,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(RECORD_COMPENSATION_FAILURE_SQL)
            .bind(compensation.into_uuid())
            .bind(error)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}

impl<'r> FromRow<'r, PgRow> for CompensationRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let size: String = row.try_get("size")?;
        let color: String = row.try_get("color")?;

        Ok(Self {
            uuid: CompensationUuid::from_uuid(row.try_get("uuid")?),
            order_uuid: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            variant: Variant::new(size, color),
            quantity: try_get_quantity(row, "quantity")?,
            attempts: try_get_quantity(row, "attempts")?,
            last_error: row.try_get("last_error")?,
            created_at: try_get_timestamp(row, "created_at")?,
            settled_at: try_get_optional_timestamp(row, "settled_at")?,
        })
    }
}
