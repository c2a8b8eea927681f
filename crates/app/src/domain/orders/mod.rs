//! Orders
//!
//! Checkout, the order lifecycle and the stock returned by cancellations.

pub mod compensation;
pub mod data;
pub mod errors;
pub mod number;
pub mod records;
mod service;
pub mod transaction;
pub mod transitions;

pub use compensation::{CancellationCompensator, CompensationReport};
pub use errors::OrdersServiceError;
pub use number::OrderNumber;
pub use service::*;
pub use transaction::OrderTransaction;
pub use transitions::{BatchTransitionReport, OrderStateMachine, SkippedOrder};
