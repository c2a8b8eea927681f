//! Carts service.

use std::sync::Arc;

use async_trait::async_trait;
use checkout::prelude::{PricingPolicy, Variant};
use mockall::automock;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        carts::{
            cache::ValidationCache,
            data::{AddItem, CartItemChange, CartItemPrice, ItemQuantity, NewCartItem},
            errors::CartsServiceError,
            records::{CartItemRecord, CartItemUuid, CartRecord},
            validation::{CartIssue, CartIssueKind, CartSummary, CartValidation},
        },
        catalog::records::ProductUuid,
        stock::{StockError, StockLedger, VariantSnapshot, VariantStock},
        users::UserUuid,
    },
    store::{CheckoutStore, StoreError},
};

/// Cart operations backed by a [`CheckoutStore`], with variant lookups memoised in a
/// [`ValidationCache`].
#[derive(Debug, Clone)]
pub struct CartStore {
    store: Arc<dyn CheckoutStore>,
    ledger: StockLedger,
    cache: Arc<ValidationCache>,
    pricing: PricingPolicy,
}

impl CartStore {
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        cache: Arc<ValidationCache>,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            ledger: StockLedger::new(Arc::clone(&store)),
            store,
            cache,
            pricing,
        }
    }

    async fn snapshot(
        &self,
        product: ProductUuid,
        variant: Option<&Variant>,
    ) -> Result<VariantSnapshot, CartsServiceError> {
        if let Some(cached) = self.cache.get(product, variant) {
            return Ok(cached);
        }

        let snapshot = self.ledger.snapshot(product, variant).await?;

        self.cache.put(product, variant, snapshot);

        Ok(snapshot)
    }

    /// Reject lines that could not be bought as requested.
    fn ensure_sellable(
        product: ProductUuid,
        variant: Option<&Variant>,
        snapshot: VariantSnapshot,
        quantity: u32,
    ) -> Result<(), CartsServiceError> {
        if !snapshot.active {
            return Err(CartsServiceError::ProductUnavailable(product));
        }

        match (snapshot.stock, variant) {
            (VariantStock::Missing, Some(variant)) => Err(CartsServiceError::VariantNotFound {
                product,
                variant: variant.clone(),
            }),
            (VariantStock::InStock(available), _) if quantity > available => {
                Err(CartsServiceError::InsufficientStock {
                    product,
                    variant: variant.cloned(),
                    requested: quantity,
                    available,
                })
            }
            _ => Ok(()),
        }
    }

    async fn change_for(
        &self,
        cart: &CartRecord,
        update: ItemQuantity,
    ) -> Result<CartItemChange, CartsServiceError> {
        if update.quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        let line = cart
            .item(update.item)
            .ok_or(CartsServiceError::ItemNotFound)?;

        let snapshot = self
            .snapshot(line.product_uuid, line.variant.as_ref())
            .await?;

        Self::ensure_sellable(
            line.product_uuid,
            line.variant.as_ref(),
            snapshot,
            update.quantity,
        )?;

        Ok(CartItemChange {
            item: update.item,
            quantity: update.quantity,
            unit_price: snapshot.unit_price,
        })
    }
}

#[async_trait]
impl CartsService for CartStore {
    #[tracing::instrument(name = "carts.service.get_cart", skip(self), fields(user_uuid = %user), err)]
    async fn get_cart(&self, user: UserUuid) -> Result<CartRecord, CartsServiceError> {
        Ok(self.store.get_cart(user).await?)
    }

    #[tracing::instrument(
        name = "carts.service.add_item",
        skip(self, item),
        fields(
            user_uuid = %user,
            product_uuid = %item.product_uuid,
            quantity = item.quantity
        ),
        err
    )]
    async fn add_item(
        &self,
        user: UserUuid,
        item: AddItem,
    ) -> Result<CartItemRecord, CartsServiceError> {
        if item.quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        if let Some(key) = item.idempotency_key
            && let Some(line) = self.store.find_cart_request(user, key).await?
        {
            debug!(item_uuid = %line.uuid, "repeated cart request");

            return Ok(line);
        }

        let product = item.product_uuid;
        let variant = Variant::from_parts(item.size.as_deref(), item.color.as_deref());

        let snapshot = self.snapshot(product, variant.as_ref()).await?;

        Self::ensure_sellable(product, variant.as_ref(), snapshot, item.quantity)?;

        let line_variant = variant.clone();
        let line = NewCartItem {
            uuid: CartItemUuid::new(),
            product_uuid: product,
            variant,
            quantity: item.quantity,
            unit_price: snapshot.unit_price,
            idempotency_key: item.idempotency_key,
        };

        let line = match self
            .store
            .upsert_cart_item(user, line, snapshot.stock.units())
            .await
        {
            Ok(line) => line,
            Err(StoreError::LimitExceeded { requested, limit }) => {
                return Err(CartsServiceError::InsufficientStock {
                    product,
                    variant: line_variant,
                    requested,
                    available: limit,
                });
            }
            Err(error) => return Err(error.into()),
        };

        info!(item_uuid = %line.uuid, line_quantity = line.quantity, "added cart item");

        Ok(line)
    }

    #[tracing::instrument(
        name = "carts.service.update_item",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item),
        err
    )]
    async fn update_item(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        quantity: u32,
    ) -> Result<CartItemRecord, CartsServiceError> {
        let cart = self.store.get_cart(user).await?;
        let change = self.change_for(&cart, ItemQuantity { item, quantity }).await?;

        let cart = self.store.update_cart_items(user, &[change]).await?;

        cart.item(item)
            .cloned()
            .ok_or(CartsServiceError::ItemNotFound)
    }

    #[tracing::instrument(
        name = "carts.service.remove_item",
        skip(self),
        fields(user_uuid = %user, item_uuid = %item),
        err
    )]
    async fn remove_item(&self, user: UserUuid, item: CartItemUuid) -> Result<(), CartsServiceError> {
        let removed = self.store.remove_cart_item(user, item).await?;

        if !removed {
            debug!("cart item already absent");
        }

        Ok(())
    }

    #[tracing::instrument(
        name = "carts.service.bulk_update",
        skip(self, updates),
        fields(user_uuid = %user, update_count = updates.len()),
        err
    )]
    async fn bulk_update(
        &self,
        user: UserUuid,
        updates: Vec<ItemQuantity>,
    ) -> Result<CartRecord, CartsServiceError> {
        let mut seen = FxHashSet::default();

        if let Some(duplicate) = updates.iter().find(|update| !seen.insert(update.item)) {
            return Err(CartsServiceError::DuplicateItem(duplicate.item));
        }

        let cart = self.store.get_cart(user).await?;

        if updates.is_empty() {
            return Ok(cart);
        }

        let mut changes = Vec::with_capacity(updates.len());

        for update in updates {
            changes.push(self.change_for(&cart, update).await?);
        }

        Ok(self.store.update_cart_items(user, &changes).await?)
    }

    #[tracing::instrument(name = "carts.service.clear", skip(self), fields(user_uuid = %user), err)]
    async fn clear(&self, user: UserUuid) -> Result<(), CartsServiceError> {
        Ok(self.store.clear_cart(user).await?)
    }

    #[tracing::instrument(
        name = "carts.service.validate",
        skip(self),
        fields(user_uuid = %user, issue_count = tracing::field::Empty),
        err
    )]
    async fn validate(&self, user: UserUuid) -> Result<CartValidation, CartsServiceError> {
        let mut cart = self.store.get_cart(user).await?;
        let mut issues = Vec::new();
        let mut prices = Vec::new();

        for line in &mut cart.items {
            let issue = |kind| CartIssue {
                item: line.uuid,
                product: line.product_uuid,
                variant: line.variant.clone(),
                kind,
            };

            let snapshot = match self
                .ledger
                .snapshot(line.product_uuid, line.variant.as_ref())
                .await
            {
                Ok(snapshot) => snapshot,
                Err(StockError::ProductNotFound(_)) => {
                    issues.push(issue(CartIssueKind::Unavailable));
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            self.cache
                .put(line.product_uuid, line.variant.as_ref(), snapshot);

            if !snapshot.active {
                issues.push(issue(CartIssueKind::Unavailable));
                continue;
            }

            if snapshot.unit_price != line.unit_price {
                issues.push(issue(CartIssueKind::PriceChange {
                    previous: line.unit_price,
                    current: snapshot.unit_price,
                }));

                prices.push(CartItemPrice {
                    item: line.uuid,
                    unit_price: snapshot.unit_price,
                });

                line.unit_price = snapshot.unit_price;
            }

            match snapshot.stock.units() {
                Some(0) => issues.push(issue(CartIssueKind::OutOfStock)),
                Some(available) if available < line.quantity => {
                    issues.push(issue(CartIssueKind::InsufficientStock {
                        requested: line.quantity,
                        available,
                    }));
                }
                _ => {}
            }
        }

        if !prices.is_empty()
            && let Err(error) = self.store.reprice_cart_items(user, &prices).await
        {
            warn!(%error, "failed to persist corrected cart prices");
        }

        tracing::Span::current().record("issue_count", issues.len());

        Ok(CartValidation { cart, issues })
    }

    #[tracing::instrument(name = "carts.service.summary", skip(self), fields(user_uuid = %user), err)]
    async fn summary(&self, user: UserUuid) -> Result<CartSummary, CartsServiceError> {
        let cart = self.store.get_cart(user).await?;

        let estimate = self.pricing.totals_from_minor(
            cart.items
                .iter()
                .map(|line| (line.unit_price, line.quantity)),
        )?;

        Ok(CartSummary {
            line_count: cart.items.len(),
            item_count: cart.item_count(),
            estimate,
        })
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// The user's cart, created empty on first access.
    async fn get_cart(&self, user: UserUuid) -> Result<CartRecord, CartsServiceError>;

    /// Add units of a product variant, merging with an existing line for the same variant.
    async fn add_item(
        &self,
        user: UserUuid,
        item: AddItem,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Set the quantity of one line.
    async fn update_item(
        &self,
        user: UserUuid,
        item: CartItemUuid,
        quantity: u32,
    ) -> Result<CartItemRecord, CartsServiceError>;

    /// Remove a line. Removing a missing line succeeds.
    async fn remove_item(&self, user: UserUuid, item: CartItemUuid) -> Result<(), CartsServiceError>;

    /// Set the quantities of several lines; either every update applies or none does.
    async fn bulk_update(
        &self,
        user: UserUuid,
        updates: Vec<ItemQuantity>,
    ) -> Result<CartRecord, CartsServiceError>;

    /// Remove every line.
    async fn clear(&self, user: UserUuid) -> Result<(), CartsServiceError>;

    /// Re-check every line against current catalog data, correcting stale prices.
    async fn validate(&self, user: UserUuid) -> Result<CartValidation, CartsServiceError>;

    /// Counts and estimated totals from the current snapshot prices.
    async fn summary(&self, user: UserUuid) -> Result<CartSummary, CartsServiceError>;
}
