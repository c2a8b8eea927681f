//! Checkout Store
//!
//! Persistence seam shared by carts, checkout and cancellation. Two backends exist:
//! [`PgStore`] runs checkout inside one database transaction, [`MemoryStore`] keeps state in
//! process and undoes a failed checkout by replaying its [`SagaLog`] in reverse.

use std::fmt::Debug;

use async_trait::async_trait;
use checkout::prelude::{OrderStatus, PaymentStatus, Variant};
use jiff::Timestamp;
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    carts::{
        data::{CartItemChange, CartItemPrice, NewCartItem},
        records::{CartItemRecord, CartItemUuid, CartRecord},
    },
    catalog::{data::NewProduct, records::ProductRecord, records::ProductUuid},
    orders::{
        data::{NewOrder, OrderQuery, Reservation, StatusChange},
        number::OrderNumber,
        records::{CompensationRecord, CompensationUuid, OrderRecord, OrderUuid},
    },
    users::UserUuid,
};

mod memory;
mod postgres;
mod saga;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use saga::{Rollback, SagaLog, SagaStep};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    AlreadyExists,

    #[error("record was changed concurrently")]
    Conflict,

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("quantity {requested} would exceed the limit of {limit}")]
    LimitExceeded { requested: u32, limit: u32 },

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("unit of work already finished")]
    Finished,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

/// Everything checkout persists, behind one seam.
#[async_trait]
pub trait CheckoutStore: Send + Sync + Debug {
    /// Create or replace a product and its whole stock table.
    async fn save_product(&self, product: NewProduct) -> Result<ProductRecord, StoreError>;

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, StoreError>;

    /// Return units to a variant's stock, yielding the new quantity.
    async fn release_stock(
        &self,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<u32, StoreError>;

    /// The user's cart, created empty on first access.
    async fn get_cart(&self, user: UserUuid) -> Result<CartRecord, StoreError>;

    /// The line an earlier request with this idempotency key produced, if it still exists.
    async fn find_cart_request(
        &self,
        user: UserUuid,
        key: Uuid,
    ) -> Result<Option<CartItemRecord>, StoreError>;

    /// Insert a line, or add to the quantity of the line with the same product and variant.
    ///
    /// The merge is a single atomic step. With `limit`, a resulting quantity above it fails
    /// with [`StoreError::LimitExceeded`] and nothing is written. A repeated idempotency key
    /// returns the line it produced without changing it again.
    async fn upsert_cart_item(
        &self,
        user: UserUuid,
        item: NewCartItem,
        limit: Option<u32>,
    ) -> Result<CartItemRecord, StoreError>;

    /// Overwrite the quantity and price of existing lines, all or nothing.
    async fn update_cart_items(
        &self,
        user: UserUuid,
        changes: &[CartItemChange],
    ) -> Result<CartRecord, StoreError>;

    /// Delete a line; returns whether it existed.
    async fn remove_cart_item(&self, user: UserUuid, item: CartItemUuid)
    -> Result<bool, StoreError>;

    async fn clear_cart(&self, user: UserUuid) -> Result<(), StoreError>;

    /// Overwrite snapshot prices of lines that still exist.
    async fn reprice_cart_items(
        &self,
        user: UserUuid,
        prices: &[CartItemPrice],
    ) -> Result<(), StoreError>;

    /// Start a checkout for the user. Holds the user's lock until the unit is finished or
    /// dropped.
    async fn begin_checkout(
        &self,
        user: UserUuid,
    ) -> Result<Box<dyn CheckoutUnit + '_>, StoreError>;

    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, StoreError>;

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<OrderRecord, StoreError>;

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderRecord>, StoreError>;

    /// Apply a status transition if the order is still in `expected`.
    ///
    /// Appends the history entry, stamps timestamps, and enqueues the change's compensations
    /// in one step. Fails with [`StoreError::Conflict`] when the status moved meanwhile.
    async fn change_order_status(
        &self,
        order: OrderUuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> Result<OrderRecord, StoreError>;

    async fn update_payment_status(
        &self,
        order: OrderUuid,
        status: PaymentStatus,
        paid_at: Option<Timestamp>,
    ) -> Result<OrderRecord, StoreError>;

    /// Unsettled compensations, oldest first, optionally for one order.
    async fn pending_compensations(
        &self,
        order: Option<OrderUuid>,
        limit: u32,
    ) -> Result<Vec<CompensationRecord>, StoreError>;

    /// Return a compensation's units to stock and mark it settled, atomically. Settling an
    /// already settled compensation changes nothing.
    async fn settle_compensation(
        &self,
        compensation: CompensationUuid,
    ) -> Result<CompensationRecord, StoreError>;

    async fn record_compensation_failure(
        &self,
        compensation: CompensationUuid,
        error: &str,
    ) -> Result<(), StoreError>;
}

/// One checkout in flight.
///
/// Reads through a unit are fresh; the unit never serves cached data.
#[async_trait]
pub trait CheckoutUnit: Send {
    /// Whether `rollback` discards every write without compensation.
    fn is_atomic(&self) -> bool;

    async fn load_cart(&mut self) -> Result<CartRecord, StoreError>;

    async fn load_product(&mut self, product: ProductUuid) -> Result<ProductRecord, StoreError>;

    /// Insert the order in its initial status with its first history entry.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the order number is taken, leaving the
    /// unit usable.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRecord, StoreError>;

    /// Decrement a variant's stock only if enough remains.
    async fn reserve_stock(&mut self, reservation: &Reservation) -> Result<u32, StoreError>;

    async fn clear_cart(&mut self) -> Result<Vec<CartItemRecord>, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Undo the unit's writes. `log` lists the completed steps, oldest first.
    async fn rollback(&mut self, log: &SagaLog) -> Result<Rollback, StoreError>;
}
