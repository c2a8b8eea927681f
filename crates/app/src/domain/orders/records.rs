//! Order Records

use checkout::prelude::{OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, Variant};
use jiff::Timestamp;

use crate::{
    domain::{
        addresses::records::ShippingAddress, catalog::records::ProductUuid,
        orders::number::OrderNumber, users::UserUuid,
    },
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Order Record
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    pub order_number: OrderNumber,
    pub user: UserUuid,
    pub items: Vec<OrderLineRecord>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub totals: OrderTotals,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub paid_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Order Line UUID
pub type OrderLineUuid = TypedUuid<OrderLineRecord>;

/// Snapshot of a purchased product, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRecord {
    pub uuid: OrderLineUuid,
    pub product_uuid: ProductUuid,
    pub name: String,
    pub image: Option<String>,
    pub variant: Option<Variant>,
    pub quantity: u32,
    pub price: u64,
    pub discount_price: Option<u64>,

    /// Effective unit price charged
    pub unit_price: u64,
}

/// One entry of an order's append-only status log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: Timestamp,
}

/// Compensation UUID
pub type CompensationUuid = TypedUuid<CompensationRecord>;

/// Stock owed back to a variant by a cancelled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationRecord {
    pub uuid: CompensationUuid,
    pub order_uuid: OrderUuid,
    pub product_uuid: ProductUuid,
    pub variant: Variant,
    pub quantity: u32,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl CompensationRecord {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}
