//! Test context for service-level tests over the in-process store.

use std::{sync::Arc, time::Duration};

use checkout::prelude::PricingPolicy;
use rust_decimal::Decimal;

use crate::{
    domain::{
        addresses::records::{AddressUuid, NewAddress},
        carts::{CartStore, ValidationCache},
        orders::OrderProcessor,
        users::UserUuid,
    },
    store::MemoryStore,
    test::helpers,
};

const CACHE_TTL: Duration = Duration::from_secs(30);
const ORDER_TIMEOUT: Duration = Duration::from_secs(5);

/// USD, free shipping above 500.00, flat 50 otherwise, 10% tax.
pub(crate) fn pricing() -> PricingPolicy {
    PricingPolicy::new("USD", 500, 50, Decimal::TEN).expect("USD is a valid currency")
}

pub struct TestContext {
    pub store: MemoryStore,
    pub cache: Arc<ValidationCache>,
    pub carts: CartStore,
    pub orders: OrderProcessor,
    pub user: UserUuid,
    pub address: AddressUuid,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_order_timeout(ORDER_TIMEOUT)
    }

    pub fn with_order_timeout(timeout: Duration) -> Self {
        let store = MemoryStore::new();
        let cache = Arc::new(ValidationCache::new(CACHE_TTL));
        let user = UserUuid::new();

        let address = store
            .save_address(NewAddress {
                uuid: AddressUuid::new(),
                user,
                address: helpers::shipping_address(),
            })
            .uuid;

        let shared = Arc::new(store.clone());

        Self {
            carts: CartStore::new(shared.clone(), Arc::clone(&cache), pricing()),
            orders: OrderProcessor::new(
                shared.clone(),
                shared,
                Arc::clone(&cache),
                pricing(),
                timeout,
            ),
            store,
            cache,
            user,
            address,
        }
    }

    /// Register another address for `user`.
    pub fn add_address(&self, user: UserUuid) -> AddressUuid {
        self.store
            .save_address(NewAddress {
                uuid: AddressUuid::new(),
                user,
                address: helpers::shipping_address(),
            })
            .uuid
    }
}
