//! Order state machine.

use std::sync::Arc;

use checkout::prelude::{OrderStatus, PaymentStatus, Transition, TransitionEffect};
use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::{
    domain::orders::{
        compensation::CancellationCompensator,
        data::StatusChange,
        errors::OrdersServiceError,
        records::{OrderRecord, OrderUuid},
    },
    store::{CheckoutStore, StoreError},
};

/// Attempts before a transition racing other writers gives up.
const TRANSITION_ATTEMPTS: usize = 3;

/// An order a batch update left alone, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOrder {
    pub order: OrderUuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTransitionReport {
    pub updated: Vec<OrderUuid>,
    pub skipped: Vec<SkippedOrder>,
}

#[derive(Debug, Clone)]
pub struct OrderStateMachine {
    store: Arc<dyn CheckoutStore>,
    compensator: CancellationCompensator,
}

impl OrderStateMachine {
    #[must_use]
    pub fn new(store: Arc<dyn CheckoutStore>, compensator: CancellationCompensator) -> Self {
        Self { store, compensator }
    }

    /// Move an order to `status`, applying the transition's side effects.
    ///
    /// Requesting the current status returns the order untouched. The change is applied only
    /// if the status is still the one it was planned from; otherwise it is re-planned.
    ///
    /// # Errors
    ///
    /// - [`OrdersServiceError::IllegalTransition`]: the lifecycle forbids the move.
    /// - [`OrdersServiceError::Conflict`]: the order kept changing underneath.
    #[tracing::instrument(
        name = "orders.state_machine.transition",
        skip(self, note),
        fields(order_uuid = %order, status = %status),
        err
    )]
    pub async fn transition(
        &self,
        order: OrderUuid,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let current = self.store.get_order(order).await?;

            let Transition::Apply { from, to, effects } =
                current.status.transition(status, current.payment_method)?
            else {
                debug!("order already in requested status");
                return Ok(current);
            };

            let change = Self::plan(&current, to, note.clone(), &effects);

            match self.store.change_order_status(order, from, change).await {
                Ok(updated) => {
                    info!(%from, %to, "order status changed");

                    if effects.contains(&TransitionEffect::ReleaseStock) {
                        self.compensator.settle_order(order).await;
                    }

                    return Ok(updated);
                }
                Err(StoreError::Conflict) if attempts < TRANSITION_ATTEMPTS => {
                    debug!(attempts, "order status moved concurrently");
                }
                Err(StoreError::Conflict) => return Err(OrdersServiceError::Conflict(order)),
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Apply the same transition to many orders, reporting the ones it could not move.
    #[tracing::instrument(
        name = "orders.state_machine.transition_many",
        skip(self, orders, note),
        fields(order_count = orders.len(), status = %status)
    )]
    pub async fn transition_many(
        &self,
        orders: &[OrderUuid],
        status: OrderStatus,
        note: Option<String>,
    ) -> BatchTransitionReport {
        let mut report = BatchTransitionReport::default();

        for &order in orders {
            match self.transition(order, status, note.clone()).await {
                Ok(_) => report.updated.push(order),
                Err(error) => {
                    warn!(order_uuid = %order, %error, "skipped order");

                    report.skipped.push(SkippedOrder {
                        order,
                        reason: error.to_string(),
                    });
                }
            }
        }

        report
    }

    fn plan(
        order: &OrderRecord,
        to: OrderStatus,
        note: Option<String>,
        effects: &[TransitionEffect],
    ) -> StatusChange {
        let now = Timestamp::now();
        let mut change = StatusChange::new(to, note, now);

        for effect in effects {
            match effect {
                TransitionEffect::StampDeliveredAt => change.delivered_at = Some(now),
                TransitionEffect::CompletePayment => {
                    change.payment_status = Some(PaymentStatus::Completed);
                    change.paid_at = Some(now);
                }
                TransitionEffect::StampCancelledAt => {
                    change.cancelled_at = Some(now);
                    change.cancellation_reason.clone_from(&change.note);
                }
                TransitionEffect::ReleaseStock => {
                    change.compensations = CancellationCompensator::plan(order);
                }
            }
        }

        change
    }
}
