//! Cancellation compensator.
//!
//! Cancelling an order enqueues one compensation per reserved line in the same write as the
//! status change. Settling a compensation returns its units to stock and marks it done in one
//! atomic step, so stock is released exactly once no matter how often settlement runs.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    domain::{
        carts::ValidationCache,
        orders::{
            data::NewCompensation,
            records::{CompensationRecord, CompensationUuid, OrderRecord, OrderUuid},
        },
    },
    store::{CheckoutStore, StoreError},
};

/// Outcome of one settlement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub settled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct CancellationCompensator {
    store: Arc<dyn CheckoutStore>,
    cache: Arc<ValidationCache>,
}

impl CancellationCompensator {
    #[must_use]
    pub fn new(store: Arc<dyn CheckoutStore>, cache: Arc<ValidationCache>) -> Self {
        Self { store, cache }
    }

    /// Compensations owed by an order: one per line that reserved stock.
    #[must_use]
    pub fn plan(order: &OrderRecord) -> Vec<NewCompensation> {
        order
            .items
            .iter()
            .filter_map(|line| {
                line.variant.as_ref().map(|variant| NewCompensation {
                    uuid: CompensationUuid::new(),
                    product_uuid: line.product_uuid,
                    variant: variant.clone(),
                    quantity: line.quantity,
                })
            })
            .collect()
    }

    /// Settle everything an order is owed. Failures are logged and left for the retry sweep.
    #[tracing::instrument(
        name = "orders.compensator.settle_order",
        skip(self),
        fields(order_uuid = %order)
    )]
    pub async fn settle_order(&self, order: OrderUuid) -> CompensationReport {
        match self.store.pending_compensations(Some(order), u32::MAX).await {
            Ok(pending) => self.settle_all(pending).await,
            Err(error) => {
                warn!(%error, "failed to load compensations; leaving them for the retry sweep");
                CompensationReport::default()
            }
        }
    }

    /// Settle up to `limit` of the oldest outstanding compensations.
    ///
    /// # Errors
    ///
    /// Returns an error only if the outstanding compensations cannot be listed.
    #[tracing::instrument(name = "orders.compensator.retry_pending", skip(self), err)]
    pub async fn retry_pending(&self, limit: u32) -> Result<CompensationReport, StoreError> {
        let pending = self.store.pending_compensations(None, limit).await?;

        Ok(self.settle_all(pending).await)
    }

    pub async fn pending(&self, limit: u32) -> Result<Vec<CompensationRecord>, StoreError> {
        self.store.pending_compensations(None, limit).await
    }

    async fn settle_all(&self, pending: Vec<CompensationRecord>) -> CompensationReport {
        let mut report = CompensationReport::default();

        for compensation in pending {
            match self.store.settle_compensation(compensation.uuid).await {
                Ok(settled) => {
                    report.settled += 1;

                    self.cache.invalidate(settled.product_uuid);

                    info!(
                        compensation_uuid = %settled.uuid,
                        product_uuid = %settled.product_uuid,
                        variant = %settled.variant,
                        quantity = settled.quantity,
                        "released stock"
                    );
                }
                Err(failure) => {
                    report.failed += 1;

                    warn!(
                        compensation_uuid = %compensation.uuid,
                        attempts = compensation.attempts.saturating_add(1),
                        error = %failure,
                        "failed to release stock"
                    );

                    if let Err(error) = self
                        .store
                        .record_compensation_failure(compensation.uuid, &failure.to_string())
                        .await
                    {
                        error!(
                            compensation_uuid = %compensation.uuid,
                            %error,
                            "failed to record compensation failure"
                        );
                    }
                }
            }
        }

        report
    }
}
