//! Order Data

use checkout::prelude::{OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, Variant};
use jiff::Timestamp;

use crate::domain::{
    addresses::records::{AddressUuid, ShippingAddress},
    catalog::records::ProductUuid,
    orders::{
        number::OrderNumber,
        records::{CompensationUuid, OrderLineRecord, OrderRecord, OrderUuid, StatusHistoryEntry},
    },
    users::UserUuid,
};

/// Note recorded with the first history entry of every order.
pub const ORDER_CREATED_NOTE: &str = "Order created";

/// What the customer submits at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub address: AddressUuid,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// New Order Data, as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub uuid: OrderUuid,
    pub order_number: OrderNumber,
    pub user: UserUuid,
    pub items: Vec<OrderLineRecord>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub notes: Option<String>,
    pub created_at: Timestamp,
}

impl NewOrder {
    /// The order as first stored: initial status, pending payment, one history entry.
    #[must_use]
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            uuid: self.uuid,
            order_number: self.order_number.clone(),
            user: self.user,
            items: self.items.clone(),
            shipping_address: self.shipping_address.clone(),
            payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::INITIAL,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::INITIAL,
                note: Some(ORDER_CREATED_NOTE.to_string()),
                at: self.created_at,
            }],
            totals: self.totals,
            notes: self.notes.clone(),
            cancellation_reason: None,
            paid_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Stock taken by one order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub product_uuid: ProductUuid,
    pub variant: Variant,
    pub quantity: u32,
}

/// Compensation to enqueue alongside a cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompensation {
    pub uuid: CompensationUuid,
    pub product_uuid: ProductUuid,
    pub variant: Variant,
    pub quantity: u32,
}

/// Everything written by one status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: Timestamp,
    pub payment_status: Option<PaymentStatus>,
    pub paid_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub compensations: Vec<NewCompensation>,
}

impl StatusChange {
    #[must_use]
    pub fn new(status: OrderStatus, note: Option<String>, at: Timestamp) -> Self {
        Self {
            status,
            note,
            at,
            payment_status: None,
            paid_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            compensations: Vec::new(),
        }
    }
}

/// Filter and page for order listings. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub user: Option<UserUuid>,
    pub status: Option<OrderStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl OrderQuery {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    #[must_use]
    pub fn for_user(user: UserUuid) -> Self {
        Self {
            user: Some(user),
            status: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Page size clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }
}
