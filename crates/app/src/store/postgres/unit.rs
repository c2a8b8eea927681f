//! Checkout inside one Postgres transaction.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::{
    domain::{
        carts::records::{CartItemRecord, CartRecord, CartUuid},
        catalog::records::{ProductRecord, ProductUuid},
        orders::{
            data::{NewOrder, Reservation},
            records::OrderRecord,
        },
        users::UserUuid,
    },
    store::{
        CheckoutUnit, Rollback, SagaLog, StoreError,
        postgres::{
            carts::PgCartsRepository, orders::PgOrdersRepository, products::PgProductsRepository,
        },
    },
};

/// Every write lands in `tx`; nothing is visible to others before commit, and the user's
/// advisory lock is held throughout.
pub(super) struct PgCheckoutUnit {
    tx: Option<Transaction<'static, Postgres>>,
    user: UserUuid,
    cart: Option<CartUuid>,
    products: PgProductsRepository,
    carts: PgCartsRepository,
    orders: PgOrdersRepository,
}

impl PgCheckoutUnit {
    pub(super) fn new(tx: Transaction<'static, Postgres>, user: UserUuid) -> Self {
        Self {
            tx: Some(tx),
            user,
            cart: None,
            products: PgProductsRepository,
            carts: PgCartsRepository,
            orders: PgOrdersRepository,
        }
    }
}

#[async_trait]
impl CheckoutUnit for PgCheckoutUnit {
    fn is_atomic(&self) -> bool {
        true
    }

    async fn load_cart(&mut self) -> Result<CartRecord, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;

        let cart = self.carts.load_cart(tx, self.user).await?;

        self.cart = Some(cart.uuid);

        Ok(cart)
    }

    async fn load_product(&mut self, product: ProductUuid) -> Result<ProductRecord, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;

        Ok(self.products.get_product(tx, product).await?)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRecord, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;

        self.orders.insert_order(tx, order).await
    }

    async fn reserve_stock(&mut self, reservation: &Reservation) -> Result<u32, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;

        self.products.reserve_stock(tx, reservation).await
    }

    async fn clear_cart(&mut self) -> Result<Vec<CartItemRecord>, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::Finished)?;

        let cart = match self.cart {
            Some(cart) => cart,
            None => self.carts.ensure_cart(tx, self.user).await?.uuid,
        };

        Ok(self.carts.clear(tx, cart).await?)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::Finished)?;

        tx.commit().await?;

        Ok(())
    }

    async fn rollback(&mut self, _log: &SagaLog) -> Result<Rollback, StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }

        Ok(Rollback::Aborted)
    }
}
