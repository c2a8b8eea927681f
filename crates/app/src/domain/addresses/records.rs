//! Address Records

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{domain::users::UserUuid, uuids::TypedUuid};

/// Address UUID
pub type AddressUuid = TypedUuid<AddressRecord>;

/// Address Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub uuid: AddressUuid,
    pub user: UserUuid,
    pub address: ShippingAddress,
    pub created_at: Timestamp,
}

/// New Address Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub uuid: AddressUuid,
    pub user: UserUuid,
    pub address: ShippingAddress,
}

/// The address fields copied onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub lines: Vec<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}
