//! Checkout step log used to undo a partially applied checkout.

use crate::domain::{
    carts::records::CartItemRecord,
    orders::{data::Reservation, records::OrderUuid},
};

/// A completed checkout write.
#[derive(Debug, Clone, PartialEq)]
pub enum SagaStep {
    OrderInserted(OrderUuid),
    StockReserved(Reservation),
    CartCleared(Vec<CartItemRecord>),
}

/// Completed steps of one checkout, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SagaLog {
    steps: Vec<SagaStep>,
}

impl SagaLog {
    pub fn record(&mut self, step: SagaStep) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Steps newest first, the order they must be undone in.
    pub fn undo_order(&self) -> impl Iterator<Item = &SagaStep> {
        self.steps.iter().rev()
    }
}

/// How a unit undid its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollback {
    /// Nothing was ever visible outside the unit.
    Aborted,

    /// Visible writes were reversed by compensating steps.
    Compensated { steps: usize },
}
