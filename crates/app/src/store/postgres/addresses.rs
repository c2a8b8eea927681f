//! Addresses Repository

use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};

use crate::{
    domain::{
        addresses::records::{AddressRecord, AddressUuid, NewAddress, ShippingAddress},
        users::UserUuid,
    },
    store::postgres::rows::try_get_timestamp,
};

const CREATE_ADDRESS_SQL: &str = include_str!("sql/create_address.sql");
const GET_ADDRESS_SQL: &str = include_str!("sql/get_address.sql");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PgAddressesRepository;

impl PgAddressesRepository {
    pub(crate) async fn create_address(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        address: &NewAddress,
    ) -> Result<AddressRecord, sqlx::Error> {
        let fields = &address.address;

        query_as::<Postgres, AddressRecord>(CREATE_ADDRESS_SQL)
            .bind(address.uuid.into_uuid())
            .bind(address.user.into_uuid())
            .bind(&fields.full_name)
            .bind(&fields.phone)
            .bind(&fields.lines)
            .bind(&fields.city)
            .bind(&fields.state)
            .bind(&fields.zip)
            .bind(&fields.country)
            .fetch_one(&mut **tx)
            .await
    }

    /// The address, if it belongs to `user`.
    pub(crate) async fn get_address(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<AddressRecord, sqlx::Error> {
        query_as::<Postgres, AddressRecord>(GET_ADDRESS_SQL)
            .bind(address.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for AddressRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: AddressUuid::from_uuid(row.try_get("uuid")?),
            user: UserUuid::from_uuid(row.try_get("user_uuid")?),
            address: ShippingAddress {
                full_name: row.try_get("full_name")?,
                phone: row.try_get("phone")?,
                lines: row.try_get("lines")?,
                city: row.try_get("city")?,
                state: row.try_get("state")?,
                zip: row.try_get("zip")?,
                country: row.try_get("country")?,
            },
            created_at: try_get_timestamp(row, "created_at")?,
        })
    }
}
