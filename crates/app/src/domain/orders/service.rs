//! Orders service.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use checkout::prelude::{OrderStatus, PaymentStatus, PricingPolicy};
use jiff::Timestamp;
use mockall::automock;
use tracing::info;

use crate::{
    domain::{
        addresses::AddressBook,
        carts::ValidationCache,
        orders::{
            compensation::{CancellationCompensator, CompensationReport},
            data::{OrderQuery, PlaceOrder},
            errors::OrdersServiceError,
            number::OrderNumber,
            records::{CompensationRecord, OrderRecord, OrderUuid},
            transaction::OrderTransaction,
            transitions::{BatchTransitionReport, OrderStateMachine},
        },
        users::UserUuid,
    },
    store::CheckoutStore,
};

/// Order placement, lookup and lifecycle over a [`CheckoutStore`].
#[derive(Clone)]
pub struct OrderProcessor {
    store: Arc<dyn CheckoutStore>,
    transaction: OrderTransaction,
    machine: OrderStateMachine,
    compensator: CancellationCompensator,
}

impl Debug for OrderProcessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OrderProcessor")
            .field("transaction", &self.transaction)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl OrderProcessor {
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        addresses: Arc<dyn AddressBook>,
        cache: Arc<ValidationCache>,
        pricing: PricingPolicy,
        timeout: Duration,
    ) -> Self {
        let compensator = CancellationCompensator::new(Arc::clone(&store), Arc::clone(&cache));

        Self {
            transaction: OrderTransaction::new(
                Arc::clone(&store),
                addresses,
                cache,
                pricing,
                timeout,
            ),
            machine: OrderStateMachine::new(Arc::clone(&store), compensator.clone()),
            compensator,
            store,
        }
    }
}

#[async_trait]
impl OrdersService for OrderProcessor {
    async fn create_order(
        &self,
        user: UserUuid,
        request: PlaceOrder,
    ) -> Result<OrderRecord, OrdersServiceError> {
        self.transaction.execute(user, request).await
    }

    #[tracing::instrument(
        name = "orders.service.get_order",
        skip(self),
        fields(user_uuid = %user, order_uuid = %order),
        err
    )]
    async fn get_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let record = self.store.get_order(order).await?;

        if record.user != user {
            return Err(OrdersServiceError::NotFound);
        }

        Ok(record)
    }

    #[tracing::instrument(
        name = "orders.service.get_order_by_number",
        skip(self),
        fields(order_number = %number),
        err
    )]
    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<OrderRecord, OrdersServiceError> {
        Ok(self.store.find_order_by_number(number).await?)
    }

    #[tracing::instrument(name = "orders.service.list_orders", skip(self), err)]
    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>, OrdersServiceError> {
        Ok(self.store.list_orders(&query).await?)
    }

    async fn transition(
        &self,
        order: OrderUuid,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<OrderRecord, OrdersServiceError> {
        self.machine.transition(order, status, note).await
    }

    async fn batch_transition(
        &self,
        orders: Vec<OrderUuid>,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<BatchTransitionReport, OrdersServiceError> {
        Ok(self.machine.transition_many(&orders, status, note).await)
    }

    #[tracing::instrument(
        name = "orders.service.cancel_order",
        skip(self, reason),
        fields(user_uuid = %user, order_uuid = %order),
        err
    )]
    async fn cancel_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
        reason: String,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let record = self.store.get_order(order).await?;

        if record.user != user {
            return Err(OrdersServiceError::NotFound);
        }

        self.machine
            .transition(order, OrderStatus::Cancelled, Some(reason))
            .await
    }

    #[tracing::instrument(
        name = "orders.service.record_payment",
        skip(self),
        fields(order_uuid = %order, payment_status = %status),
        err
    )]
    async fn record_payment(
        &self,
        order: OrderUuid,
        status: PaymentStatus,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let paid_at = (status == PaymentStatus::Completed).then(Timestamp::now);

        let record = self
            .store
            .update_payment_status(order, status, paid_at)
            .await?;

        info!("recorded payment status");

        Ok(record)
    }

    async fn pending_compensations(
        &self,
        limit: u32,
    ) -> Result<Vec<CompensationRecord>, OrdersServiceError> {
        Ok(self.compensator.pending(limit).await?)
    }

    async fn retry_compensations(
        &self,
        limit: u32,
    ) -> Result<CompensationReport, OrdersServiceError> {
        Ok(self.compensator.retry_pending(limit).await?)
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Turn the user's cart into an order.
    async fn create_order(
        &self,
        user: UserUuid,
        request: PlaceOrder,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// One of the user's orders.
    async fn get_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError>;

    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Orders matching the query, newest first.
    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>, OrdersServiceError>;

    /// Move an order along its lifecycle.
    async fn transition(
        &self,
        order: OrderUuid,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Move many orders; orders that cannot move are reported, not fatal.
    async fn batch_transition(
        &self,
        orders: Vec<OrderUuid>,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<BatchTransitionReport, OrdersServiceError>;

    /// Cancel one of the user's orders and return its stock.
    async fn cancel_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
        reason: String,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Record what the payment gateway reported.
    async fn record_payment(
        &self,
        order: OrderUuid,
        status: PaymentStatus,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Stock releases that have not gone through yet, oldest first.
    async fn pending_compensations(
        &self,
        limit: u32,
    ) -> Result<Vec<CompensationRecord>, OrdersServiceError>;

    /// Retry up to `limit` outstanding stock releases.
    async fn retry_compensations(
        &self,
        limit: u32,
    ) -> Result<CompensationReport, OrdersServiceError>;
}
