//! Validation cache.
//!
//! Short-lived memo of product variant sale facts, used to keep cart edits cheap. Entries are
//! advisory: checkout always re-reads the store.

use std::time::Duration;

use checkout::prelude::Variant;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;

use crate::domain::{catalog::records::ProductUuid, stock::VariantSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    product: ProductUuid,
    variant: Option<Variant>,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    snapshot: VariantSnapshot,
    /// `None` when the time-to-live reaches past what the clock can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

#[derive(Debug)]
pub struct ValidationCache {
    entries: Mutex<FxHashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ValidationCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            ttl,
        }
    }

    /// Default time-to-live for new entries
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached facts for a variant, unless missing or expired. Expired entries are dropped.
    #[must_use]
    pub fn get(&self, product: ProductUuid, variant: Option<&Variant>) -> Option<VariantSnapshot> {
        let key = CacheKey {
            product,
            variant: variant.cloned(),
        };

        let mut entries = self.entries.lock();

        match entries.get(&key) {
            Some(entry) if entry.is_live(Instant::now()) => Some(entry.snapshot),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store facts for a variant with the default time-to-live.
    pub fn put(&self, product: ProductUuid, variant: Option<&Variant>, snapshot: VariantSnapshot) {
        self.put_with_ttl(product, variant, snapshot, self.ttl);
    }

    pub fn put_with_ttl(
        &self,
        product: ProductUuid,
        variant: Option<&Variant>,
        snapshot: VariantSnapshot,
        ttl: Duration,
    ) {
        let key = CacheKey {
            product,
            variant: variant.cloned(),
        };

        self.entries.lock().insert(
            key,
            CacheEntry {
                snapshot,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    /// Drop every entry of a product.
    pub fn invalidate(&self, product: ProductUuid) {
        self.entries.lock().retain(|key, _| key.product != product);
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();

        entries.retain(|_, entry| entry.is_live(now));

        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::VariantStock;

    fn snapshot(unit_price: u64) -> VariantSnapshot {
        VariantSnapshot {
            active: true,
            unit_price,
            stock: VariantStock::InStock(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ValidationCache::new(Duration::from_secs(30));
        let product = ProductUuid::new();
        let variant = Variant::new("M", "Red");

        cache.put(product, Some(&variant), snapshot(100));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get(product, Some(&variant)), Some(snapshot(100)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(product, Some(&variant)), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired_entries() {
        let cache = ValidationCache::new(Duration::from_secs(30));
        let fresh = ProductUuid::new();
        let stale = ProductUuid::new();

        cache.put_with_ttl(stale, None, snapshot(100), Duration::from_secs(5));
        cache.put(fresh, None, snapshot(200));

        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(fresh, None), Some(snapshot(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_ttl_keeps_entries() {
        let cache = ValidationCache::new(Duration::MAX);
        let product = ProductUuid::new();

        cache.put(product, None, snapshot(100));

        tokio::time::advance(Duration::from_secs(86_400)).await;

        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.get(product, None), Some(snapshot(100)));
    }

    #[test]
    fn variants_are_cached_separately() {
        let cache = ValidationCache::new(Duration::from_secs(30));
        let product = ProductUuid::new();

        cache.put(product, Some(&Variant::new("M", "Red")), snapshot(100));

        assert!(cache.get(product, Some(&Variant::new("L", "Red"))).is_none());
        assert!(cache.get(product, None).is_none());
    }

    #[test]
    fn invalidate_drops_all_variants_of_a_product() {
        let cache = ValidationCache::new(Duration::from_secs(30));
        let product = ProductUuid::new();
        let other = ProductUuid::new();

        cache.put(product, Some(&Variant::new("M", "Red")), snapshot(100));
        cache.put(product, None, snapshot(100));
        cache.put(other, None, snapshot(100));

        cache.invalidate(product);

        assert_eq!(cache.len(), 1);
    }
}
