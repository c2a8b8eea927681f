//! Checkout transaction.
//!
//! Turns a user's cart into an order: re-validates every line against fresh catalog data,
//! prices the order, persists it, takes stock and empties the cart. The steps either all take
//! effect or none do. On a transactional store that is one database transaction; otherwise
//! completed steps are undone in reverse and the caller sees
//! [`OrdersServiceError::PartialFailure`].

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Duration,
};

use checkout::prelude::PricingPolicy;
use jiff::Timestamp;
use tokio::time::{Instant, timeout_at};
use tracing::{Span, debug, error, info, warn};

use crate::{
    domain::{
        addresses::AddressBook,
        carts::ValidationCache,
        orders::{
            data::{NewOrder, PlaceOrder, Reservation},
            errors::OrdersServiceError,
            number::OrderNumber,
            records::{OrderLineRecord, OrderLineUuid, OrderRecord, OrderUuid},
        },
        stock::StockLedger,
        users::UserUuid,
    },
    store::{CheckoutStore, CheckoutUnit, Rollback, SagaLog, SagaStep, StoreError},
};

const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct OrderTransaction {
    store: Arc<dyn CheckoutStore>,
    addresses: Arc<dyn AddressBook>,
    ledger: StockLedger,
    cache: Arc<ValidationCache>,
    pricing: PricingPolicy,
    timeout: Duration,
}

impl Debug for OrderTransaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OrderTransaction")
            .field("store", &self.store)
            .field("pricing", &self.pricing)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Longest a checkout may run, whatever the configured timeout.
const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

impl OrderTransaction {
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        addresses: Arc<dyn AddressBook>,
        cache: Arc<ValidationCache>,
        pricing: PricingPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger: StockLedger::new(Arc::clone(&store)),
            store,
            addresses,
            cache,
            pricing,
            timeout: timeout.min(MAX_TIMEOUT),
        }
    }

    /// Place an order from the user's cart.
    ///
    /// # Errors
    ///
    /// - [`OrdersServiceError::EmptyCart`] / [`OrdersServiceError::AddressNotFound`]
    /// - [`OrdersServiceError::ProductUnavailable`] / [`OrdersServiceError::VariantNotFound`] /
    ///   [`OrdersServiceError::InsufficientStock`]: a line can no longer be bought.
    /// - [`OrdersServiceError::TimedOut`]: the deadline passed before commit.
    /// - [`OrdersServiceError::PartialFailure`]: one of the above happened after writes became
    ///   visible, and they were undone.
    #[tracing::instrument(
        name = "orders.transaction.execute",
        skip(self, request),
        fields(
            user_uuid = %user,
            order_uuid = tracing::field::Empty,
            order_number = tracing::field::Empty
        ),
        err
    )]
    pub async fn execute(
        &self,
        user: UserUuid,
        request: PlaceOrder,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let deadline = Instant::now() + self.timeout;

        let mut unit = timeout_at(deadline, self.store.begin_checkout(user))
            .await
            .map_err(|_elapsed| OrdersServiceError::TimedOut)??;

        let mut log = SagaLog::default();

        let outcome = match timeout_at(
            deadline,
            self.run(unit.as_mut(), user, &request, &mut log),
        )
        .await
        {
            Ok(Ok(order)) => unit.commit().await.map(|()| order).map_err(Into::into),
            Ok(Err(error)) => Err(error),
            Err(_elapsed) => Err(OrdersServiceError::TimedOut),
        };

        match outcome {
            Ok(order) => {
                let span = Span::current();

                span.record("order_uuid", tracing::field::display(order.uuid));
                span.record(
                    "order_number",
                    tracing::field::display(&order.order_number),
                );

                for line in &order.items {
                    self.cache.invalidate(line.product_uuid);
                }

                info!(
                    total_amount = order.totals.total_amount,
                    line_count = order.items.len(),
                    "placed order"
                );

                Ok(order)
            }
            Err(cause) => Err(Self::abort(unit.as_mut(), &log, cause).await),
        }
    }

    async fn run(
        &self,
        unit: &mut (dyn CheckoutUnit + '_),
        user: UserUuid,
        request: &PlaceOrder,
        log: &mut SagaLog,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let cart = unit.load_cart().await?;

        if cart.items.is_empty() {
            return Err(OrdersServiceError::EmptyCart);
        }

        let address = self
            .addresses
            .get_address(user, request.address)
            .await
            .map_err(|error| match error {
                StoreError::NotFound => OrdersServiceError::AddressNotFound,
                other => other.into(),
            })?;

        let mut lines = Vec::with_capacity(cart.items.len());
        let mut reservations = Vec::new();

        for item in &cart.items {
            let product = unit
                .load_product(item.product_uuid)
                .await
                .map_err(|error| match error {
                    StoreError::NotFound => OrdersServiceError::ProductUnavailable {
                        product: item.product_uuid,
                    },
                    other => other.into(),
                })?;

            if !product.active {
                return Err(OrdersServiceError::ProductUnavailable {
                    product: product.uuid,
                });
            }

            if let Some(variant) = &item.variant {
                let entry =
                    product
                        .stock_for(variant)
                        .ok_or_else(|| OrdersServiceError::VariantNotFound {
                            product: product.uuid,
                            variant: variant.clone(),
                        })?;

                if entry.quantity < item.quantity {
                    return Err(OrdersServiceError::InsufficientStock {
                        product: product.uuid,
                        variant: variant.clone(),
                        requested: item.quantity,
                        available: entry.quantity,
                    });
                }

                reservations.push(Reservation {
                    product_uuid: product.uuid,
                    variant: variant.clone(),
                    quantity: item.quantity,
                });
            }

            lines.push(OrderLineRecord {
                uuid: OrderLineUuid::new(),
                product_uuid: product.uuid,
                unit_price: product.unit_price(),
                name: product.name,
                image: product.image,
                variant: item.variant.clone(),
                quantity: item.quantity,
                price: product.price,
                discount_price: product.discount_price,
            });
        }

        let totals = self
            .pricing
            .totals_from_minor(lines.iter().map(|line| (line.unit_price, line.quantity)))?;

        let now = Timestamp::now();

        let mut order = NewOrder {
            uuid: OrderUuid::new(),
            order_number: OrderNumber::generate(now),
            user,
            items: lines,
            shipping_address: address.address,
            payment_method: request.payment_method,
            totals,
            notes: request.notes.clone(),
            created_at: now,
        };

        let record = Self::insert_order(unit, &mut order).await?;

        log.record(SagaStep::OrderInserted(record.uuid));

        for reservation in reservations {
            self.ledger.reserve(unit, &reservation).await?;

            log.record(SagaStep::StockReserved(reservation));
        }

        let cleared = unit.clear_cart().await?;

        log.record(SagaStep::CartCleared(cleared));

        Ok(record)
    }

    /// Insert the order, drawing a new number when the generated one is taken.
    async fn insert_order(
        unit: &mut (dyn CheckoutUnit + '_),
        order: &mut NewOrder,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut attempts = 1;

        loop {
            match unit.insert_order(order).await {
                Ok(record) => return Ok(record),
                Err(StoreError::AlreadyExists) if attempts < ORDER_NUMBER_ATTEMPTS => {
                    debug!(order_number = %order.order_number, "order number taken");

                    attempts += 1;
                    order.order_number = OrderNumber::generate(order.created_at);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn abort(
        unit: &mut (dyn CheckoutUnit + '_),
        log: &SagaLog,
        cause: OrdersServiceError,
    ) -> OrdersServiceError {
        match unit.rollback(log).await {
            Ok(Rollback::Aborted) => {
                debug!(%cause, "checkout rolled back");
                cause
            }
            Ok(Rollback::Compensated { steps }) => {
                warn!(%cause, steps, "checkout compensated after partial completion");

                OrdersServiceError::PartialFailure {
                    cause: Box::new(cause),
                }
            }
            Err(error) if unit.is_atomic() => {
                warn!(%cause, %error, "checkout rollback failed; the transaction was discarded");
                cause
            }
            Err(error) => {
                error!(%cause, %error, "checkout compensation failed");

                OrdersServiceError::PartialFailure {
                    cause: Box::new(cause),
                }
            }
        }
    }
}
