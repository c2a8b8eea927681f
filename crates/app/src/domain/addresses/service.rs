//! Address book lookups.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    domain::{
        addresses::records::{AddressRecord, AddressUuid},
        users::UserUuid,
    },
    store::StoreError,
};

#[automock]
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Fetch one of the user's saved addresses.
    ///
    /// Addresses owned by another user are reported as [`StoreError::NotFound`].
    async fn get_address(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<AddressRecord, StoreError>;
}
