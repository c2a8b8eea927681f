//! App Context

use std::sync::Arc;

use checkout::prelude::PricingError;
use thiserror::Error;

use crate::{
    config::{CheckoutConfig, CheckoutSettings},
    database::{self, Db},
    domain::{
        addresses::AddressBook,
        carts::{CartStore, CartsService, ValidationCache},
        orders::{OrderProcessor, OrdersService},
    },
    store::{CheckoutStore, PgStore},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("invalid pricing configuration")]
    Pricing(#[from] PricingError),
}

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn CheckoutStore>,
    pub cache: Arc<ValidationCache>,
    pub carts: Arc<dyn CartsService>,
    pub orders: Arc<dyn OrdersService>,
    pub settings: CheckoutSettings,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection fails or the pricing
    /// configuration is invalid.
    pub async fn from_database_url(url: &str, config: &CheckoutConfig) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        let store = Arc::new(PgStore::new(Db::new(pool)));

        Self::with_store(store.clone(), store, config)
    }

    /// Wire the services over an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error when the pricing configuration is invalid.
    pub fn with_store(
        store: Arc<dyn CheckoutStore>,
        addresses: Arc<dyn AddressBook>,
        config: &CheckoutConfig,
    ) -> Result<Self, AppInitError> {
        let pricing = config.pricing()?;
        let settings = config.settings();
        let cache = Arc::new(ValidationCache::new(settings.cache_ttl));

        Ok(Self {
            carts: Arc::new(CartStore::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                pricing.clone(),
            )),
            orders: Arc::new(OrderProcessor::new(
                Arc::clone(&store),
                addresses,
                Arc::clone(&cache),
                pricing,
                settings.order_timeout,
            )),
            store,
            cache,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use checkout::prelude::PaymentMethod;
    use clap::Parser;
    use testresult::TestResult;

    use super::*;
    use crate::{
        domain::{
            addresses::{AddressUuid, NewAddress},
            orders::data::PlaceOrder,
            users::UserUuid,
        },
        store::MemoryStore,
        test::helpers,
    };

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        checkout: CheckoutConfig,
    }

    #[tokio::test]
    async fn configured_pricing_reaches_order_totals() -> TestResult {
        let config = Harness::try_parse_from([
            "checkout",
            "--free-shipping-threshold",
            "1000",
            "--flat-shipping-fee",
            "300",
            "--tax-percent",
            "5",
        ])?
        .checkout;

        let store = MemoryStore::new();
        let shared = Arc::new(store.clone());
        let context = AppContext::with_store(shared.clone(), shared, &config)?;

        let user = UserUuid::new();
        let address = store
            .save_address(NewAddress {
                uuid: AddressUuid::new(),
                user,
                address: helpers::shipping_address(),
            })
            .uuid;
        let product = helpers::seed_product(&store, 400, None, &[("M", "Red", 3)]).await?;

        context
            .carts
            .add_item(user, helpers::add(product.uuid, 2, "M", "Red"))
            .await?;

        let order = context
            .orders
            .create_order(
                user,
                PlaceOrder {
                    address,
                    payment_method: PaymentMethod::BankTransfer,
                    notes: None,
                },
            )
            .await?;

        assert_eq!(order.totals.items_total, 800);
        assert_eq!(order.totals.shipping_charge, 300);
        assert_eq!(order.totals.tax, 40);
        assert_eq!(order.totals.total_amount, 1140);

        Ok(())
    }

    #[test]
    fn invalid_pricing_fails_to_initialise() -> TestResult {
        let config = Harness::try_parse_from(["checkout", "--tax-percent=-1"])?.checkout;
        let shared = Arc::new(MemoryStore::new());

        assert!(matches!(
            AppContext::with_store(shared.clone(), shared, &config),
            Err(AppInitError::Pricing(PricingError::NegativeTaxRate))
        ));

        Ok(())
    }
}
