//! In-process store.
//!
//! Every operation runs under one lock over the whole state, so each call is atomic on its
//! own. A checkout, however, spans many calls: it holds the user's lock throughout and undoes
//! its completed steps on failure instead of discarding them.

use std::sync::Arc;

use async_trait::async_trait;
use checkout::prelude::{OrderStatus, PaymentStatus, Variant};
use jiff::Timestamp;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    domain::{
        addresses::{
            AddressBook,
            records::{AddressRecord, AddressUuid, NewAddress},
        },
        carts::{
            data::{CartItemChange, CartItemPrice, NewCartItem},
            records::{CartItemRecord, CartItemUuid, CartRecord, CartUuid},
        },
        catalog::{
            data::NewProduct,
            records::{ProductRecord, ProductUuid, StockEntryRecord},
        },
        orders::{
            data::{NewOrder, OrderQuery, Reservation, StatusChange},
            number::OrderNumber,
            records::{
                CompensationRecord, CompensationUuid, OrderRecord, OrderUuid, StatusHistoryEntry,
            },
        },
        users::UserUuid,
    },
    store::{CheckoutStore, CheckoutUnit, Rollback, SagaLog, SagaStep, StoreError},
};

#[derive(Debug, Default)]
struct State {
    products: FxHashMap<ProductUuid, ProductRecord>,
    carts: FxHashMap<UserUuid, CartRecord>,
    requests: FxHashMap<(UserUuid, Uuid), CartItemUuid>,
    addresses: FxHashMap<AddressUuid, AddressRecord>,
    orders: FxHashMap<OrderUuid, OrderRecord>,
    order_numbers: FxHashMap<OrderNumber, OrderUuid>,
    compensations: Vec<CompensationRecord>,
}

impl State {
    fn cart_mut(&mut self, user: UserUuid, now: Timestamp) -> &mut CartRecord {
        self.carts.entry(user).or_insert_with(|| CartRecord {
            uuid: CartUuid::new(),
            user,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    fn stock_mut(
        &mut self,
        product: ProductUuid,
        variant: &Variant,
    ) -> Result<&mut StockEntryRecord, StoreError> {
        self.products
            .get_mut(&product)
            .and_then(|record| {
                record
                    .stock
                    .iter_mut()
                    .find(|entry| &entry.variant == variant)
            })
            .ok_or(StoreError::NotFound)
    }

    fn release(
        &mut self,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        let entry = self.stock_mut(product, variant)?;

        entry.quantity = entry
            .quantity
            .checked_add(quantity)
            .ok_or(StoreError::InvalidData)?;

        Ok(entry.quantity)
    }
}

/// Faults injected into the next matching operation.
#[cfg(test)]
#[derive(Debug, Default)]
struct Faults {
    drain_before_reserve: Option<(ProductUuid, Variant)>,
    reserve_delay: Option<std::time::Duration>,
    failing_settlements: u32,
}

/// Store keeping all state in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    user_locks: Arc<Mutex<FxHashMap<UserUuid, Arc<AsyncMutex<()>>>>>,
    #[cfg(test)]
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Save an address for a user.
    pub fn save_address(&self, address: NewAddress) -> AddressRecord {
        let record = AddressRecord {
            uuid: address.uuid,
            user: address.user,
            address: address.address,
            created_at: Timestamp::now(),
        };

        self.state
            .write()
            .addresses
            .insert(record.uuid, record.clone());

        record
    }

    async fn lock_user(&self, user: UserUuid) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.user_locks.lock().entry(user).or_default());

        lock.lock_owned().await
    }

    /// Empty a variant's stock right before the next reservation of it, as a concurrent buyer
    /// would.
    #[cfg(test)]
    pub(crate) fn drain_before_reserve(&self, product: ProductUuid, variant: Variant) {
        self.faults.lock().drain_before_reserve = Some((product, variant));
    }

    /// Stall every reservation by `delay`.
    #[cfg(test)]
    pub(crate) fn delay_reservations(&self, delay: std::time::Duration) {
        self.faults.lock().reserve_delay = Some(delay);
    }

    /// Fail the next `count` settlements with a storage error.
    #[cfg(test)]
    pub(crate) fn fail_settlements(&self, count: u32) {
        self.faults.lock().failing_settlements = count;
    }

    /// Current quantity of one variant, if stocked.
    #[cfg(test)]
    pub(crate) fn stock_level(&self, product: ProductUuid, variant: &Variant) -> Option<u32> {
        self.state
            .read()
            .products
            .get(&product)
            .and_then(|record| record.stock_for(variant))
            .map(|entry| entry.quantity)
    }

    #[cfg(test)]
    pub(crate) fn order_count(&self) -> usize {
        self.state.read().orders.len()
    }
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn save_product(&self, product: NewProduct) -> Result<ProductRecord, StoreError> {
        let now = Timestamp::now();
        let mut state = self.state.write();

        let created_at = state
            .products
            .get(&product.uuid)
            .map_or(now, |existing| existing.created_at);

        let stock = product
            .stock
            .iter()
            .map(|entry| StockEntryRecord {
                uuid: entry.uuid,
                product_uuid: product.uuid,
                variant: entry.variant(),
                quantity: entry.quantity,
            })
            .collect::<Vec<_>>();

        for (index, entry) in stock.iter().enumerate() {
            if stock
                .iter()
                .take(index)
                .any(|earlier| earlier.variant == entry.variant)
            {
                return Err(StoreError::AlreadyExists);
            }
        }

        let record = ProductRecord {
            uuid: product.uuid,
            name: product.name,
            image: product.image,
            price: product.price,
            discount_price: product.discount_price,
            active: product.active,
            stock,
            created_at,
            updated_at: now,
        };

        state.products.insert(record.uuid, record.clone());

        Ok(record)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, StoreError> {
        self.state
            .read()
            .products
            .get(&product)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn release_stock(
        &self,
        product: ProductUuid,
        variant: &Variant,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        self.state.write().release(product, variant, quantity)
    }

    async fn get_cart(&self, user: UserUuid) -> Result<CartRecord, StoreError> {
        Ok(self.state.write().cart_mut(user, Timestamp::now()).clone())
    }

    async fn find_cart_request(
        &self,
        user: UserUuid,
        key: Uuid,
    ) -> Result<Option<CartItemRecord>, StoreError> {
        let state = self.state.read();

        Ok(state
            .requests
            .get(&(user, key))
            .and_then(|&item| state.carts.get(&user)?.item(item))
            .cloned())
    }

    async fn upsert_cart_item(
        &self,
        user: UserUuid,
        item: NewCartItem,
        limit: Option<u32>,
    ) -> Result<CartItemRecord, StoreError> {
        let _guard = self.lock_user(user).await;

        let now = Timestamp::now();
        let mut state = self.state.write();

        if let Some(key) = item.idempotency_key
            && let Some(existing) = state.requests.get(&(user, key)).copied()
        {
            if let Some(line) = state.carts.get(&user).and_then(|cart| cart.item(existing)) {
                return Ok(line.clone());
            }

            // The line it produced is gone; the key is free again.
            state.requests.remove(&(user, key));
        }

        let exceeds = |quantity: u32| limit.is_some_and(|limit| quantity > limit);

        let cart = state.cart_mut(user, now);

        let line = match cart
            .items
            .iter_mut()
            .find(|line| line.holds(item.product_uuid, item.variant.as_ref()))
        {
            Some(line) => {
                let quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(StoreError::InvalidData)?;

                if exceeds(quantity) {
                    return Err(StoreError::LimitExceeded {
                        requested: quantity,
                        limit: limit.unwrap_or(u32::MAX),
                    });
                }

                line.quantity = quantity;
                line.unit_price = item.unit_price;
                line.updated_at = now;

                line.clone()
            }
            None => {
                if exceeds(item.quantity) {
                    return Err(StoreError::LimitExceeded {
                        requested: item.quantity,
                        limit: limit.unwrap_or(u32::MAX),
                    });
                }

                let line = CartItemRecord {
                    uuid: item.uuid,
                    product_uuid: item.product_uuid,
                    variant: item.variant,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    added_at: now,
                    updated_at: now,
                };

                cart.items.push(line.clone());

                line
            }
        };

        cart.updated_at = now;

        if let Some(key) = item.idempotency_key {
            state.requests.insert((user, key), line.uuid);
        }

        Ok(line)
    }

    async fn update_cart_items(
        &self,
        user: UserUuid,
        changes: &[CartItemChange],
    ) -> Result<CartRecord, StoreError> {
        let _guard = self.lock_user(user).await;

        let now = Timestamp::now();
        let mut state = self.state.write();
        let cart = state.cart_mut(user, now);

        if changes
            .iter()
            .any(|change| cart.item(change.item).is_none())
        {
            return Err(StoreError::NotFound);
        }

        for change in changes {
            if let Some(line) = cart.items.iter_mut().find(|line| line.uuid == change.item) {
                line.quantity = change.quantity;
                line.unit_price = change.unit_price;
                line.updated_at = now;
            }
        }

        cart.updated_at = now;

        Ok(cart.clone())
    }

    async fn remove_cart_item(
        &self,
        user: UserUuid,
        item: CartItemUuid,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock_user(user).await;

        let now = Timestamp::now();
        let mut state = self.state.write();
        let cart = state.cart_mut(user, now);

        let before = cart.items.len();

        cart.items.retain(|line| line.uuid != item);

        let removed = cart.items.len() != before;

        if removed {
            cart.updated_at = now;
        }

        Ok(removed)
    }

    async fn clear_cart(&self, user: UserUuid) -> Result<(), StoreError> {
        let _guard = self.lock_user(user).await;

        let now = Timestamp::now();
        let mut state = self.state.write();
        let cart = state.cart_mut(user, now);

        cart.items.clear();
        cart.updated_at = now;

        Ok(())
    }

    async fn reprice_cart_items(
        &self,
        user: UserUuid,
        prices: &[CartItemPrice],
    ) -> Result<(), StoreError> {
        let _guard = self.lock_user(user).await;

        let now = Timestamp::now();
        let mut state = self.state.write();
        let cart = state.cart_mut(user, now);

        for price in prices {
            if let Some(line) = cart.items.iter_mut().find(|line| line.uuid == price.item) {
                line.unit_price = price.unit_price;
                line.updated_at = now;
            }
        }

        Ok(())
    }

    async fn begin_checkout(
        &self,
        user: UserUuid,
    ) -> Result<Box<dyn CheckoutUnit + '_>, StoreError> {
        let guard = self.lock_user(user).await;

        Ok(Box::new(MemoryCheckoutUnit {
            store: self,
            user,
            _guard: guard,
        }))
    }

    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, StoreError> {
        self.state
            .read()
            .orders
            .get(&order)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<OrderRecord, StoreError> {
        let state = self.state.read();

        state
            .order_numbers
            .get(number)
            .and_then(|uuid| state.orders.get(uuid))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderRecord>, StoreError> {
        let state = self.state.read();

        let mut orders = state
            .orders
            .values()
            .filter(|order| query.user.is_none_or(|user| order.user == user))
            .filter(|order| query.status.is_none_or(|status| order.status == status))
            .collect::<Vec<_>>();

        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.uuid.cmp(&a.uuid))
        });

        Ok(orders
            .into_iter()
            .skip(query.offset as usize)
            .take(query.effective_limit() as usize)
            .cloned()
            .collect())
    }

    async fn change_order_status(
        &self,
        order: OrderUuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> Result<OrderRecord, StoreError> {
        let mut state = self.state.write();

        let record = state.orders.get_mut(&order).ok_or(StoreError::NotFound)?;

        if record.status != expected {
            return Err(StoreError::Conflict);
        }

        record.status = change.status;
        record.updated_at = change.at;
        record.status_history.push(StatusHistoryEntry {
            status: change.status,
            note: change.note,
            at: change.at,
        });

        if let Some(payment_status) = change.payment_status {
            record.payment_status = payment_status;
        }

        record.paid_at = change.paid_at.or(record.paid_at);
        record.delivered_at = change.delivered_at.or(record.delivered_at);
        record.cancelled_at = change.cancelled_at.or(record.cancelled_at);
        record.cancellation_reason = change
            .cancellation_reason
            .or_else(|| record.cancellation_reason.take());

        let updated = record.clone();

        state
            .compensations
            .extend(change.compensations.into_iter().map(|compensation| {
                CompensationRecord {
                    uuid: compensation.uuid,
                    order_uuid: order,
                    product_uuid: compensation.product_uuid,
                    variant: compensation.variant,
                    quantity: compensation.quantity,
                    attempts: 0,
                    last_error: None,
                    created_at: change.at,
                    settled_at: None,
                }
            }));

        Ok(updated)
    }

    async fn update_payment_status(
        &self,
        order: OrderUuid,
        status: PaymentStatus,
        paid_at: Option<Timestamp>,
    ) -> Result<OrderRecord, StoreError> {
        let mut state = self.state.write();

        let record = state.orders.get_mut(&order).ok_or(StoreError::NotFound)?;

        record.payment_status = status;
        record.paid_at = paid_at.or(record.paid_at);
        record.updated_at = Timestamp::now();

        Ok(record.clone())
    }

    async fn pending_compensations(
        &self,
        order: Option<OrderUuid>,
        limit: u32,
    ) -> Result<Vec<CompensationRecord>, StoreError> {
        Ok(self
            .state
            .read()
            .compensations
            .iter()
            .filter(|compensation| !compensation.is_settled())
            .filter(|compensation| order.is_none_or(|order| compensation.order_uuid == order))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn settle_compensation(
        &self,
        compensation: CompensationUuid,
    ) -> Result<CompensationRecord, StoreError> {
        #[cfg(test)]
        {
            let mut faults = self.faults.lock();

            if faults.failing_settlements > 0 {
                faults.failing_settlements -= 1;
                return Err(StoreError::Sql(sqlx::Error::PoolTimedOut));
            }
        }

        let now = Timestamp::now();
        let mut state = self.state.write();

        let index = state
            .compensations
            .iter()
            .position(|record| record.uuid == compensation)
            .ok_or(StoreError::NotFound)?;

        let pending = state.compensations[index].clone();

        if pending.is_settled() {
            return Ok(pending);
        }

        state.release(pending.product_uuid, &pending.variant, pending.quantity)?;

        let record = &mut state.compensations[index];

        record.settled_at = Some(now);

        Ok(record.clone())
    }

    async fn record_compensation_failure(
        &self,
        compensation: CompensationUuid,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();

        let record = state
            .compensations
            .iter_mut()
            .find(|record| record.uuid == compensation)
            .ok_or(StoreError::NotFound)?;

        record.attempts = record.attempts.saturating_add(1);
        record.last_error = Some(error.to_string());

        Ok(())
    }
}

#[async_trait]
impl AddressBook for MemoryStore {
    async fn get_address(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<AddressRecord, StoreError> {
        self.state
            .read()
            .addresses
            .get(&address)
            .filter(|record| record.user == user)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

/// Checkout against a [`MemoryStore`].
///
/// Writes land in shared state immediately. The user's lock keeps other cart writers out
/// until the unit is dropped.
struct MemoryCheckoutUnit<'a> {
    store: &'a MemoryStore,
    user: UserUuid,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryCheckoutUnit<'_> {
    #[cfg(test)]
    async fn inject_reservation_faults(&self, reservation: &Reservation) {
        let (drain, delay) = {
            let mut faults = self.store.faults.lock();

            let drain = faults.drain_before_reserve.take_if(|(product, variant)| {
                *product == reservation.product_uuid && *variant == reservation.variant
            });

            (drain, faults.reserve_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((product, variant)) = drain
            && let Ok(entry) = self.store.state.write().stock_mut(product, &variant)
        {
            entry.quantity = 0;
        }
    }
}

#[async_trait]
impl CheckoutUnit for MemoryCheckoutUnit<'_> {
    fn is_atomic(&self) -> bool {
        false
    }

    async fn load_cart(&mut self) -> Result<CartRecord, StoreError> {
        Ok(self
            .store
            .state
            .write()
            .cart_mut(self.user, Timestamp::now())
            .clone())
    }

    async fn load_product(&mut self, product: ProductUuid) -> Result<ProductRecord, StoreError> {
        self.store.get_product(product).await
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRecord, StoreError> {
        let mut state = self.store.state.write();

        if state.order_numbers.contains_key(&order.order_number)
            || state.orders.contains_key(&order.uuid)
        {
            return Err(StoreError::AlreadyExists);
        }

        let record = order.to_record();

        state
            .order_numbers
            .insert(record.order_number.clone(), record.uuid);
        state.orders.insert(record.uuid, record.clone());

        Ok(record)
    }

    async fn reserve_stock(&mut self, reservation: &Reservation) -> Result<u32, StoreError> {
        #[cfg(test)]
        self.inject_reservation_faults(reservation).await;

        let mut state = self.store.state.write();
        let entry = state.stock_mut(reservation.product_uuid, &reservation.variant)?;

        if entry.quantity < reservation.quantity {
            return Err(StoreError::InsufficientStock {
                requested: reservation.quantity,
                available: entry.quantity,
            });
        }

        entry.quantity -= reservation.quantity;

        Ok(entry.quantity)
    }

    async fn clear_cart(&mut self) -> Result<Vec<CartItemRecord>, StoreError> {
        let now = Timestamp::now();
        let mut state = self.store.state.write();
        let cart = state.cart_mut(self.user, now);

        cart.updated_at = now;

        Ok(std::mem::take(&mut cart.items))
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(&mut self, log: &SagaLog) -> Result<Rollback, StoreError> {
        if log.is_empty() {
            return Ok(Rollback::Aborted);
        }

        let now = Timestamp::now();
        let mut state = self.store.state.write();

        for step in log.undo_order() {
            match step {
                SagaStep::CartCleared(items) => {
                    let cart = state.cart_mut(self.user, now);

                    cart.items = items.clone();
                    cart.updated_at = now;
                }
                SagaStep::StockReserved(reservation) => {
                    state.release(
                        reservation.product_uuid,
                        &reservation.variant,
                        reservation.quantity,
                    )?;
                }
                SagaStep::OrderInserted(order) => {
                    if let Some(record) = state.orders.remove(order) {
                        state.order_numbers.remove(&record.order_number);
                    }
                }
            }
        }

        Ok(Rollback::Compensated { steps: log.len() })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::domain::catalog::data::NewStockEntry;

    fn tee(stock: u32) -> NewProduct {
        NewProduct {
            uuid: ProductUuid::new(),
            name: "Tee".to_string(),
            image: None,
            price: 100,
            discount_price: None,
            active: true,
            stock: vec![NewStockEntry {
                uuid: Default::default(),
                size: "M".to_string(),
                color: "Red".to_string(),
                quantity: stock,
            }],
        }
    }

    fn line(product: ProductUuid, quantity: u32) -> NewCartItem {
        NewCartItem {
            uuid: CartItemUuid::new(),
            product_uuid: product,
            variant: Some(Variant::new("M", "Red")),
            quantity,
            unit_price: 100,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn repeated_stock_variants_are_rejected() -> TestResult {
        let store = MemoryStore::new();
        let mut product = tee(5);
        let mut repeated = product.stock[0].clone();

        repeated.uuid = Default::default();
        repeated.quantity = 2;
        product.stock.push(repeated);

        let result = store.save_product(product.clone()).await;

        assert!(matches!(result, Err(StoreError::AlreadyExists)));
        assert!(matches!(
            store.get_product(product.uuid).await,
            Err(StoreError::NotFound)
        ));

        Ok(())
    }

    #[tokio::test]
    async fn cart_requests_resolve_until_their_line_is_removed() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let product = store.save_product(tee(10)).await?;
        let key = Uuid::now_v7();

        let mut item = line(product.uuid, 2);
        item.idempotency_key = Some(key);

        let added = store.upsert_cart_item(user, item, Some(10)).await?;

        assert_eq!(store.find_cart_request(user, key).await?, Some(added.clone()));
        assert_eq!(store.find_cart_request(UserUuid::new(), key).await?, None);

        store.remove_cart_item(user, added.uuid).await?;

        assert_eq!(store.find_cart_request(user, key).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn upsert_merges_lines_with_the_same_variant() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let product = store.save_product(tee(10)).await?;

        let first = store
            .upsert_cart_item(user, line(product.uuid, 2), None)
            .await?;
        let second = store
            .upsert_cart_item(user, line(product.uuid, 3), None)
            .await?;

        assert_eq!(first.uuid, second.uuid);
        assert_eq!(second.quantity, 5);
        assert_eq!(store.get_cart(user).await?.items.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn upsert_over_limit_writes_nothing() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let product = store.save_product(tee(3)).await?;

        store
            .upsert_cart_item(user, line(product.uuid, 2), Some(3))
            .await?;

        let result = store
            .upsert_cart_item(user, line(product.uuid, 2), Some(3))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::LimitExceeded {
                requested: 4,
                limit: 3
            })
        ));
        assert_eq!(store.get_cart(user).await?.items[0].quantity, 2);

        Ok(())
    }

    #[tokio::test]
    async fn repeated_idempotency_key_applies_once() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let product = store.save_product(tee(10)).await?;
        let key = Uuid::now_v7();

        let mut item = line(product.uuid, 2);
        item.idempotency_key = Some(key);

        store.upsert_cart_item(user, item.clone(), None).await?;
        let replayed = store.upsert_cart_item(user, item, None).await?;

        assert_eq!(replayed.quantity, 2);

        Ok(())
    }

    #[tokio::test]
    async fn rollback_undoes_completed_checkout_steps() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let product = store.save_product(tee(5)).await?;
        let variant = Variant::new("M", "Red");

        store
            .upsert_cart_item(user, line(product.uuid, 2), None)
            .await?;

        let reservation = Reservation {
            product_uuid: product.uuid,
            variant: variant.clone(),
            quantity: 2,
        };

        let mut unit = store.begin_checkout(user).await?;
        let mut log = SagaLog::default();

        unit.reserve_stock(&reservation).await?;
        log.record(SagaStep::StockReserved(reservation));

        let cleared = unit.clear_cart().await?;
        log.record(SagaStep::CartCleared(cleared));

        assert_eq!(store.stock_level(product.uuid, &variant), Some(3));

        let rollback = unit.rollback(&log).await?;
        drop(unit);

        assert_eq!(rollback, Rollback::Compensated { steps: 2 });
        assert_eq!(store.stock_level(product.uuid, &variant), Some(5));
        assert_eq!(store.get_cart(user).await?.items.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn reservation_never_oversells() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let product = store.save_product(tee(1)).await?;

        let mut unit = store.begin_checkout(user).await?;

        let result = unit
            .reserve_stock(&Reservation {
                product_uuid: product.uuid,
                variant: Variant::new("M", "Red"),
                quantity: 2,
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 2,
                available: 1
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn addresses_of_other_users_are_hidden() -> TestResult {
        let store = MemoryStore::new();
        let owner = UserUuid::new();

        let address = store.save_address(NewAddress {
            uuid: AddressUuid::new(),
            user: owner,
            address: crate::test::helpers::shipping_address(),
        });

        assert!(store.get_address(owner, address.uuid).await.is_ok());
        assert!(matches!(
            store.get_address(UserUuid::new(), address.uuid).await,
            Err(StoreError::NotFound)
        ));

        Ok(())
    }
}
