//! Column conversions shared by the repositories.
//!
//! Money is `BIGINT` and quantities are `INTEGER` in the schema; both are unsigned in the
//! domain, so every crossing is checked.

use std::{error::Error as StdError, str::FromStr};

use checkout::prelude::Variant;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{Row, postgres::PgRow};

fn decode_error(column: &str, source: impl StdError + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

pub(super) fn try_get_amount(row: &PgRow, column: &str) -> sqlx::Result<u64> {
    let amount: i64 = row.try_get(column)?;

    u64::try_from(amount).map_err(|error| decode_error(column, error))
}

pub(super) fn try_get_optional_amount(row: &PgRow, column: &str) -> sqlx::Result<Option<u64>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(|amount| u64::try_from(amount).map_err(|error| decode_error(column, error)))
        .transpose()
}

pub(super) fn try_get_quantity(row: &PgRow, column: &str) -> sqlx::Result<u32> {
    let quantity: i32 = row.try_get(column)?;

    u32::try_from(quantity).map_err(|error| decode_error(column, error))
}

pub(super) fn try_get_timestamp(row: &PgRow, column: &str) -> sqlx::Result<Timestamp> {
    Ok(row.try_get::<SqlxTimestamp, _>(column)?.to_jiff())
}

pub(super) fn try_get_optional_timestamp(
    row: &PgRow,
    column: &str,
) -> sqlx::Result<Option<Timestamp>> {
    Ok(row
        .try_get::<Option<SqlxTimestamp>, _>(column)?
        .map(SqlxTimestamp::to_jiff))
}

/// Parse a `TEXT` column holding an enum's string form.
pub(super) fn try_get_parsed<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let value: String = row.try_get(column)?;

    value.parse().map_err(|error| decode_error(column, error))
}

/// The `size`/`color` pair of a row; absent when both are `NULL`.
pub(super) fn try_get_variant(row: &PgRow) -> sqlx::Result<Option<Variant>> {
    let size: Option<String> = row.try_get("size")?;
    let color: Option<String> = row.try_get("color")?;

    Ok(Variant::from_parts(size.as_deref(), color.as_deref()))
}

pub(super) fn to_db_amount(amount: u64, column: &str) -> sqlx::Result<i64> {
    i64::try_from(amount).map_err(|error| decode_error(column, error))
}

pub(super) fn to_db_quantity(quantity: u32, column: &str) -> sqlx::Result<i32> {
    i32::try_from(quantity).map_err(|error| decode_error(column, error))
}

/// Split an optional variant into nullable `size`/`color` binds.
pub(super) fn variant_parts(variant: Option<&Variant>) -> (Option<&str>, Option<&str>) {
    variant.map_or((None, None), |variant| {
        (Some(variant.size()), Some(variant.color()))
    })
}
