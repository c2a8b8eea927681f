//! Checkout prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    items::PricedLine,
    pricing::{OrderTotals, PricingError, PricingPolicy, effective_unit_price},
    status::{
        IllegalTransition, OrderStatus, ParseStatusError, PaymentMethod, PaymentStatus,
        Transition, TransitionEffect,
    },
    variants::Variant,
};
