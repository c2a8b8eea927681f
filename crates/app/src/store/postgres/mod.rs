//! Postgres store.
//!
//! Each operation runs in its own transaction. Cart mutations and checkouts additionally take
//! the user's advisory lock, so they never interleave for one user.

use async_trait::async_trait;
use checkout::prelude::{OrderStatus, PaymentStatus, Variant};
use jiff::Timestamp;
use uuid::Uuid;

use crate::{
    database::Db,
    domain::{
        addresses::{
            AddressBook,
            records::{AddressRecord, AddressUuid, NewAddress},
        },
        carts::{
            data::{CartItemChange, CartItemPrice, NewCartItem},
            records::{CartItemRecord, CartItemUuid, CartRecord},
        },
        catalog::{
            data::NewProduct,
            records::{ProductRecord, ProductUuid},
        },
        orders::{
            data::{OrderQuery, StatusChange},
            number::OrderNumber,
            records::{CompensationRecord, CompensationUuid, OrderRecord, OrderUuid},
        },
        users::UserUuid,
    },
    store::{CheckoutStore, CheckoutUnit, StoreError},
};

mod addresses;
mod carts;
mod compensations;
mod orders;
mod products;
mod rows;
mod unit;

use addresses::PgAddressesRepository;
use carts::PgCartsRepository;
use compensations::PgCompensationsRepository;
use orders::PgOrdersRepository;
use products::PgProductsRepository;
use unit::PgCheckoutUnit;

#[derive(Debug, Clone)]
pub struct PgStore {
    db: Db,
    products: PgProductsRepository,
    carts: PgCartsRepository,
    orders: PgOrdersRepository,
    compensations: PgCompensationsRepository,
    addresses: PgAddressesRepository,
}

impl PgStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            products: PgProductsRepository,
            carts: PgCartsRepository,
            orders: PgOrdersRepository,
            compensations: PgCompensationsRepository,
            addresses: PgAddressesRepository,
        }
    }

    /// Save an address for a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the UUID is taken.
    pub async fn save_address(&self, address: NewAddress) -> Result<AddressRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let record = self.addresses.create_address(&mut tx, &address).await?;

        tx.commit().await?;

        Ok(record)
    }
}

#[async_trait]
impl CheckoutStore for PgStore {
    #[tracing::instrument(
        name = "store.pg.save_product",
        skip(self, product),
        fields(product_uuid = %product.uuid),
        err
    )]
    async fn save_product(&self, product: NewProduct) -> Result<ProductRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let record = self.products.save_product(&mut tx, &product).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let record = self.products.get_product(&mut tx, product).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn release_stock(
        &self,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        let mut tx = self.db.begin().await?;

        let remaining = self
            .products
            .release_stock(&mut tx, product, variant, quantity)
            .await?;

        tx.commit().await?;

        Ok(remaining)
    }

    async fn get_cart(&self, user: UserUuid) -> Result<CartRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let cart = self.carts.load_cart(&mut tx, user).await?;

        tx.commit().await?;

        Ok(cart)
    }

    async fn find_cart_request(
        &self,
        user: UserUuid,
        key: Uuid,
    ) -> Result<Option<CartItemRecord>, StoreError> {
        let mut tx = self.db.begin().await?;

        let line = self.carts.find_request(&mut tx, user, key).await?;

        tx.commit().await?;

        Ok(line)
    }

    async fn upsert_cart_item(
        &self,
        user: UserUuid,
        item: NewCartItem,
        limit: Option<u32>,
    ) -> Result<CartItemRecord, StoreError> {
        let mut tx = self.db.begin_user_transaction(user).await?;

        let cart = self.carts.ensure_cart(&mut tx, user).await?;

        if let Some(key) = item.idempotency_key
            && let Some(line) = self.carts.find_request(&mut tx, user, key).await?
        {
            tx.commit().await?;

            return Ok(line);
        }

        let Some(line) = self
            .carts
            .upsert_item(&mut tx, cart.uuid, &item, limit)
            .await?
        else {
            let held = self
                .carts
                .list_items(&mut tx, cart.uuid)
                .await?
                .iter()
                .find(|line| line.holds(item.product_uuid, item.variant.as_ref()))
                .map_or(0, |line| line.quantity);

            return Err(StoreError::LimitExceeded {
                requested: held.saturating_add(item.quantity),
                limit: limit.unwrap_or(u32::MAX),
            });
        };

        if let Some(key) = item.idempotency_key {
            self.carts
                .record_request(&mut tx, user, key, line.uuid)
                .await?;
        }

        self.carts.touch(&mut tx, cart.uuid).await?;

        tx.commit().await?;

        Ok(line)
    }

    async fn update_cart_items(
        &self,
        user: UserUuid,
        changes: &[CartItemChange],
    ) -> Result<CartRecord, StoreError> {
        let mut tx = self.db.begin_user_transaction(user).await?;

        let mut cart = self.carts.ensure_cart(&mut tx, user).await?;

        for change in changes {
            if !self.carts.update_item(&mut tx, cart.uuid, change).await? {
                return Err(StoreError::NotFound);
            }
        }

        self.carts.touch(&mut tx, cart.uuid).await?;

        cart.items = self.carts.list_items(&mut tx, cart.uuid).await?;

        tx.commit().await?;

        Ok(cart)
    }

    async fn remove_cart_item(
        &self,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<bool, StoreError> {
        let mut tx = self.db.begin_user_transaction(user).await?;

        let cart = self.carts.ensure_cart(&mut tx, user).await?;

        let removed = self.carts.delete_item(&mut tx, cart.uuid, item).await?;

        if removed {
            self.carts.touch(&mut tx, cart.uuid).await?;
        }

        tx.commit().await?;

        Ok(removed)
    }

    async fn clear_cart(&self, user: UserUuid) -> Result<(), StoreError> {
        let mut tx = self.db.begin_user_transaction(user).await?;

        let cart = self.carts.ensure_cart(&mut tx, user).await?;

        self.carts.clear(&mut tx, cart.uuid).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn reprice_cart_items(
        &self,
        user: UserUuid,
        prices: &[CartItemPrice],
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin_user_transaction(user).await?;

        let cart = self.carts.ensure_cart(&mut tx, user).await?;

        for price in prices {
            self.carts.reprice_item(&mut tx, cart.uuid, price).await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn begin_checkout(
        &self,
        user: UserUuid,
    ) -> Result<Box<dyn CheckoutUnit + '_>, StoreError> {
        let tx = self.db.begin_user_transaction(user).await?;

        Ok(Box::new(PgCheckoutUnit::new(tx, user)))
    }

    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let record = self.orders.get_order(&mut tx, order).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<OrderRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let record = self.orders.get_order_by_number(&mut tx, number).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderRecord>, StoreError> {
        let mut tx = self.db.begin().await?;

        let records = self.orders.list_orders(&mut tx, query).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn change_order_status(
        &self,
        order: OrderUuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> Result<OrderRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        self.orders
            .change_status(&mut tx, order, expected, &change)
            .await?;

        for compensation in &change.compensations {
            self.compensations
                .insert(&mut tx, order, compensation, change.at)
                .await?;
        }

        let record = self.orders.get_order(&mut tx, order).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn update_payment_status(
        &self,
        order: OrderUuid,
        status: PaymentStatus,
        paid_at: Option<Timestamp>,
    ) -> Result<OrderRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        if !self
            .orders
            .update_payment_status(&mut tx, order, status, paid_at)
            .await?
        {
            return Err(StoreError::NotFound);
        }

        let record = self.orders.get_order(&mut tx, order).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn pending_compensations(
        &self,
        order: Option<OrderUuid>,
        limit: u32,
    ) -> Result<Vec<CompensationRecord>, StoreError> {
        let mut tx = self.db.begin().await?;

        let pending = self.compensations.pending(&mut tx, order, limit).await?;

        tx.commit().await?;

        Ok(pending)
    }

    async fn settle_compensation(
        &self,
        compensation: CompensationUuid,
    ) -> Result<CompensationRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let pending = self.compensations.lock(&mut tx, compensation).await?;

        if pending.is_settled() {
            tx.commit().await?;

            return Ok(pending);
        }

        self.products
            .release_stock(
                &mut tx,
                pending.product_uuid,
                &pending.variant,
                pending.quantity,
            )
            .await?;

        let settled = self
            .compensations
            .mark_settled(&mut tx, compensation)
            .await?;

        tx.commit().await?;

        Ok(settled)
    }

    async fn record_compensation_failure(
        &self,
        compensation: CompensationUuid,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        if !self
            .compensations
            .record_failure(&mut tx, compensation, error)
            .await?
        {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl AddressBook for PgStore {
    async fn get_address(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<AddressRecord, StoreError> {
        let mut tx = self.db.begin().await?;

        let record = self.addresses.get_address(&mut tx, user, address).await?;

        tx.commit().await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use checkout::prelude::PaymentMethod;
    use testresult::TestResult;
    use tokio::task::JoinSet;

    use super::*;
    use crate::{
        domain::{
            carts::{CartStore, CartsService, ValidationCache},
            orders::{OrderProcessor, OrdersService, OrdersServiceError, data::PlaceOrder},
        },
        test::{db::TestDb, helpers, pricing},
    };

    struct PgContext {
        _db: TestDb,
        store: Arc<PgStore>,
        carts: CartStore,
        orders: OrderProcessor,
        user: UserUuid,
        address: AddressUuid,
    }

    impl PgContext {
        async fn new() -> Result<Self, StoreError> {
            let db = TestDb::new().await;
            let store = Arc::new(PgStore::new(Db::new(db.pool().clone())));
            let cache = Arc::new(ValidationCache::new(Duration::from_secs(30)));
            let user = UserUuid::new();

            let address = store
                .save_address(NewAddress {
                    uuid: AddressUuid::new(),
                    user,
                    address: helpers::shipping_address(),
                })
                .await?
                .uuid;

            Ok(Self {
                carts: CartStore::new(store.clone(), Arc::clone(&cache), pricing()),
                orders: OrderProcessor::new(
                    store.clone(),
                    store.clone(),
                    cache,
                    pricing(),
                    Duration::from_secs(5),
                ),
                store,
                user,
                address,
                _db: db,
            })
        }

        fn place(&self) -> PlaceOrder {
            PlaceOrder {
                address: self.address,
                payment_method: PaymentMethod::Card,
                notes: Some("Leave at the door".to_string()),
            }
        }

        async fn stock(&self, product: ProductUuid, variant: &Variant) -> Option<u32> {
            self.store
                .get_product(product)
                .await
                .ok()
                .and_then(|record| record.stock_for(variant).map(|entry| entry.quantity))
        }
    }

    #[tokio::test]
    async fn concurrent_adds_merge_into_one_line() -> TestResult {
        let ctx = PgContext::new().await?;
        let product = helpers::seed_product(ctx.store.as_ref(), 100, None, &[("M", "Red", 50)])
            .await?;

        let mut tasks = JoinSet::new();

        for _ in 0..8 {
            let carts = ctx.carts.clone();
            let user = ctx.user;
            let item = helpers::add(product.uuid, 1, "M", "Red");

            tasks.spawn(async move { carts.add_item(user, item).await });
        }

        while let Some(result) = tasks.join_next().await {
            result??;
        }

        let cart = ctx.carts.get_cart(ctx.user).await?;

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 8);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_round_trips_through_postgres() -> TestResult {
        let ctx = PgContext::new().await?;
        let product = helpers::seed_product(ctx.store.as_ref(), 100, None, &[("M", "Red", 5)])
            .await?;
        let variant = Variant::new("M", "Red");

        ctx.carts
            .add_item(ctx.user, helpers::add(product.uuid, 2, "M", "Red"))
            .await?;

        let order = ctx.orders.create_order(ctx.user, ctx.place()).await?;
        let stored = ctx.orders.get_order(ctx.user, order.uuid).await?;

        assert_eq!(stored, order);
        assert_eq!(stored.totals.total_amount, 270);
        assert_eq!(ctx.stock(product.uuid, &variant).await, Some(3));
        assert!(ctx.carts.get_cart(ctx.user).await?.items.is_empty());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_checkouts_of_one_cart_place_one_order() -> TestResult {
        let ctx = PgContext::new().await?;
        let product = helpers::seed_product(ctx.store.as_ref(), 100, None, &[("M", "Red", 5)])
            .await?;

        ctx.carts
            .add_item(ctx.user, helpers::add(product.uuid, 2, "M", "Red"))
            .await?;

        let first = tokio::spawn({
            let (orders, user, place) = (ctx.orders.clone(), ctx.user, ctx.place());

            async move { orders.create_order(user, place).await }
        });
        let second = tokio::spawn({
            let (orders, user, place) = (ctx.orders.clone(), ctx.user, ctx.place());

            async move { orders.create_order(user, place).await }
        });

        let results = [first.await?, second.await?];

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|result| matches!(result, Err(OrdersServiceError::EmptyCart)))
        );
        assert_eq!(
            ctx.orders
                .list_orders(OrderQuery::for_user(ctx.user))
                .await?
                .len(),
            1
        );
        assert_eq!(ctx.stock(product.uuid, &Variant::new("M", "Red")).await, Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn failed_checkout_rolls_back_cleanly() -> TestResult {
        let ctx = PgContext::new().await?;
        let shirt = helpers::seed_product(ctx.store.as_ref(), 100, None, &[("M", "Red", 5)])
            .await?;
        let hat = helpers::seed_product(ctx.store.as_ref(), 50, None, &[("L", "Blue", 5)])
            .await?;

        ctx.carts
            .add_item(ctx.user, helpers::add(shirt.uuid, 2, "M", "Red"))
            .await?;
        ctx.carts
            .add_item(ctx.user, helpers::add(hat.uuid, 3, "L", "Blue"))
            .await?;

        helpers::restock(ctx.store.as_ref(), &hat, 1).await?;

        let result = ctx.orders.create_order(ctx.user, ctx.place()).await;

        assert!(matches!(
            result,
            Err(OrdersServiceError::InsufficientStock { .. })
        ));
        assert_eq!(ctx.stock(shirt.uuid, &Variant::new("M", "Red")).await, Some(5));
        assert_eq!(ctx.carts.get_cart(ctx.user).await?.items.len(), 2);
        assert!(
            ctx.orders
                .list_orders(OrderQuery::for_user(ctx.user))
                .await?
                .is_empty()
        );

        Ok(())
    }

    #[tokio::test]
    async fn cancellation_settles_once_and_history_is_kept() -> TestResult {
        let ctx = PgContext::new().await?;
        let product = helpers::seed_product(ctx.store.as_ref(), 100, None, &[("M", "Red", 5)])
            .await?;
        let variant = Variant::new("M", "Red");

        ctx.carts
            .add_item(ctx.user, helpers::add(product.uuid, 2, "M", "Red"))
            .await?;

        let order = ctx.orders.create_order(ctx.user, ctx.place()).await?;

        let cancelled = ctx
            .orders
            .cancel_order(ctx.user, order.uuid, "No longer needed".to_string())
            .await?;

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.status_history.len(), 2);
        assert_eq!(ctx.stock(product.uuid, &variant).await, Some(5));

        let settled = ctx.orders.retry_compensations(10).await?;

        assert_eq!(settled.settled, 0);
        assert_eq!(ctx.stock(product.uuid, &variant).await, Some(5));

        Ok(())
    }

    #[tokio::test]
    async fn stale_expected_status_is_a_conflict() -> TestResult {
        let ctx = PgContext::new().await?;
        let product = helpers::seed_product(ctx.store.as_ref(), 100, None, &[("M", "Red", 5)])
            .await?;

        ctx.carts
            .add_item(ctx.user, helpers::add(product.uuid, 1, "M", "Red"))
            .await?;

        let order = ctx.orders.create_order(ctx.user, ctx.place()).await?;

        let result = ctx
            .store
            .change_order_status(
                order.uuid,
                OrderStatus::Confirmed,
                StatusChange::new(OrderStatus::Processing, None, Timestamp::now()),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Conflict)));

        let result = ctx
            .store
            .change_order_status(
                OrderUuid::new(),
                OrderStatus::Pending,
                StatusChange::new(OrderStatus::Confirmed, None, Timestamp::now()),
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound)));

        Ok(())
    }
}
