//! Order Status
//!
//! Order lifecycle states, payment states and the transition table that governs which moves
//! are legal and which side effects each move triggers.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// A string did not name a known status or method.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A status change that the lifecycle does not allow.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot move order from {current} to {requested}")]
pub struct IllegalTransition {
    /// Status the order is in
    pub current: OrderStatus,

    /// Status that was requested
    pub requested: OrderStatus,
}

/// Order lifecycle status.
///
/// `pending → confirmed → processing → shipped → delivered`, with `cancelled` reachable from
/// the pre-shipping states. `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting confirmation
    Pending,

    /// Confirmed by the merchant
    Confirmed,

    /// Being picked and packed
    Processing,

    /// Handed to the carrier
    Shipped,

    /// Received by the customer
    Delivered,

    /// Cancelled before shipping
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The status an order is created in.
    pub const INITIAL: Self = Self::Pending;

    /// Storage / wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// `delivered` and `cancelled` never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an order in this status may still be cancelled.
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing)
    }

    /// Position along the fulfilment path; `None` for `cancelled`.
    const fn stage(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Plan a move to `requested`.
    ///
    /// Re-applying the current status is an idempotent no-op. Forward moves may skip stages;
    /// backward moves, moves out of a terminal status, and cancelling after shipping are
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] carrying the current status when the move is not allowed.
    pub fn transition(
        self,
        requested: Self,
        payment_method: PaymentMethod,
    ) -> Result<Transition, IllegalTransition> {
        if self == requested {
            return Ok(Transition::Unchanged);
        }

        let illegal = IllegalTransition {
            current: self,
            requested,
        };

        if self.is_terminal() {
            return Err(illegal);
        }

        let mut effects = SmallVec::new();

        match requested {
            Self::Cancelled => {
                if !self.is_cancellable() {
                    return Err(illegal);
                }

                effects.push(TransitionEffect::StampCancelledAt);
                effects.push(TransitionEffect::ReleaseStock);
            }
            _ => {
                let (Some(from), Some(to)) = (self.stage(), requested.stage()) else {
                    return Err(illegal);
                };

                if to < from {
                    return Err(illegal);
                }

                if requested == Self::Delivered {
                    effects.push(TransitionEffect::StampDeliveredAt);

                    if payment_method.settles_on_delivery() {
                        effects.push(TransitionEffect::CompletePayment);
                    }
                }
            }
        }

        Ok(Transition::Apply {
            from: self,
            to: requested,
            effects,
        })
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("order status", s))
    }
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Set `delivered_at`
    StampDeliveredAt,

    /// Mark the payment completed and set `paid_at`
    CompletePayment,

    /// Set `cancelled_at` and record the reason
    StampCancelledAt,

    /// Return every reserved variant quantity to stock
    ReleaseStock,
}

/// Outcome of planning a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The order is already in the requested status.
    Unchanged,

    /// The order moves and these effects apply.
    Apply {
        /// Status before
        from: OrderStatus,

        /// Status after
        to: OrderStatus,

        /// Effects, in the order they apply
        effects: SmallVec<[TransitionEffect; 2]>,
    },
}

impl Transition {
    /// Whether the plan includes `effect`.
    pub fn has_effect(&self, effect: TransitionEffect) -> bool {
        match self {
            Self::Unchanged => false,
            Self::Apply { effects, .. } => effects.contains(&effect),
        }
    }
}

/// Payment state as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting payment
    Pending,

    /// Paid
    Completed,

    /// Payment attempt failed
    Failed,

    /// Paid and refunded
    Refunded,
}

impl PaymentStatus {
    /// Every payment status
    pub const ALL: [Self; 4] = [Self::Pending, Self::Completed, Self::Failed, Self::Refunded];

    /// Storage / wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("payment status", s))
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash or card handed over at delivery
    PayOnDelivery,

    /// Card via the payment gateway
    Card,

    /// Bank transfer
    BankTransfer,

    /// Digital wallet
    Wallet,
}

impl PaymentMethod {
    /// Every payment method
    pub const ALL: [Self; 4] = [
        Self::PayOnDelivery,
        Self::Card,
        Self::BankTransfer,
        Self::Wallet,
    ];

    /// Storage / wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PayOnDelivery => "pay_on_delivery",
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::Wallet => "wallet",
        }
    }

    /// Payment is collected when the order is delivered.
    pub const fn settles_on_delivery(self) -> bool {
        matches!(self, Self::PayOnDelivery)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("payment method", s))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    use super::OrderStatus::{Cancelled, Confirmed, Delivered, Pending, Processing, Shipped};

    #[test]
    fn same_status_is_unchanged() -> TestResult {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.transition(status, PaymentMethod::Card)?,
                Transition::Unchanged,
                "re-applying {status} should be a no-op"
            );
        }

        Ok(())
    }

    #[test]
    fn forward_moves_are_legal() -> TestResult {
        for (from, to) in [
            (Pending, Confirmed),
            (Confirmed, Processing),
            (Processing, Shipped),
            (Shipped, Delivered),
            (Confirmed, Shipped),
            (Pending, Delivered),
        ] {
            let plan = from.transition(to, PaymentMethod::Card)?;

            assert!(
                matches!(plan, Transition::Apply { from: f, to: t, .. } if f == from && t == to),
                "expected {from} -> {to} to apply, got {plan:?}"
            );
        }

        Ok(())
    }

    #[test]
    fn backward_moves_are_illegal() {
        let result = Shipped.transition(Confirmed, PaymentMethod::Card);

        assert_eq!(
            result,
            Err(IllegalTransition {
                current: Shipped,
                requested: Confirmed,
            })
        );
    }

    #[test]
    fn cancelling_before_shipping_releases_stock() -> TestResult {
        for from in [Pending, Confirmed, Processing] {
            let plan = from.transition(Cancelled, PaymentMethod::Card)?;

            assert!(plan.has_effect(TransitionEffect::ReleaseStock));
            assert!(plan.has_effect(TransitionEffect::StampCancelledAt));
        }

        Ok(())
    }

    #[test]
    fn cancelling_after_shipping_is_illegal() {
        for from in [Shipped, Delivered] {
            let result = from.transition(Cancelled, PaymentMethod::Card);

            assert_eq!(
                result.err().map(|illegal| illegal.current),
                Some(from),
                "cancelling a {from} order should be rejected"
            );
        }
    }

    #[test]
    fn cancelled_is_terminal() {
        for to in [Pending, Confirmed, Processing, Shipped, Delivered] {
            assert!(Cancelled.transition(to, PaymentMethod::Card).is_err());
        }
    }

    #[test]
    fn delivered_is_terminal() {
        for to in [Pending, Confirmed, Processing, Shipped, Cancelled] {
            assert!(Delivered.transition(to, PaymentMethod::Card).is_err());
        }
    }

    #[test]
    fn delivery_completes_pay_on_delivery_payment() -> TestResult {
        let cod = Shipped.transition(Delivered, PaymentMethod::PayOnDelivery)?;
        let card = Shipped.transition(Delivered, PaymentMethod::Card)?;

        assert!(cod.has_effect(TransitionEffect::StampDeliveredAt));
        assert!(cod.has_effect(TransitionEffect::CompletePayment));
        assert!(card.has_effect(TransitionEffect::StampDeliveredAt));
        assert!(!card.has_effect(TransitionEffect::CompletePayment));

        Ok(())
    }

    #[test]
    fn statuses_round_trip_through_strings() -> TestResult {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>()?, status);
        }

        for method in PaymentMethod::ALL {
            assert_eq!(method.to_string().parse::<PaymentMethod>()?, method);
        }

        Ok(())
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = "lost".parse::<OrderStatus>();

        assert_eq!(
            result.err().map(|error| error.to_string()),
            Some("unknown order status `lost`".to_string())
        );
    }
}
