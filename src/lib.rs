//! Checkout
//!
//! The domain core of the cart-to-order transaction engine: effective prices, order totals,
//! variant keys and the order status lifecycle. Everything here is pure; persistence and
//! orchestration live in `checkout-app`.

pub mod items;
pub mod prelude;
pub mod pricing;
pub mod status;
pub mod variants;
