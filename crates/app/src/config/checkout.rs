//! Checkout Config

use std::time::Duration;

use checkout::prelude::{PricingError, PricingPolicy};
use clap::Args;
use rust_decimal::Decimal;

/// Pricing, cache and background task settings.
#[derive(Debug, Clone, Args)]
pub struct CheckoutConfig {
    /// ISO 4217 currency code all prices are given in
    #[arg(long, env = "CHECKOUT_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Items total (minor units) above which shipping is free
    #[arg(long, env = "FREE_SHIPPING_THRESHOLD", default_value_t = 50_000)]
    pub free_shipping_threshold: u64,

    /// Shipping charge (minor units) below the free shipping threshold
    #[arg(long, env = "FLAT_SHIPPING_FEE", default_value_t = 5_000)]
    pub flat_shipping_fee: u64,

    /// Tax rate in percent points
    #[arg(long, env = "TAX_PERCENT", default_value = "10")]
    pub tax_percent: Decimal,

    /// How long a cached variant lookup stays fresh
    #[arg(long, env = "VALIDATION_CACHE_TTL_SECONDS", default_value_t = 30)]
    pub validation_cache_ttl_seconds: u64,

    /// Interval between sweeps of expired cache entries
    #[arg(long, env = "VALIDATION_CACHE_SWEEP_SECONDS", default_value_t = 60)]
    pub validation_cache_sweep_seconds: u64,

    /// Deadline for one order creation
    #[arg(long, env = "ORDER_TIMEOUT_MS", default_value_t = 5_000)]
    pub order_timeout_ms: u64,

    /// Interval between retries of unsettled compensations
    #[arg(long, env = "COMPENSATION_RETRY_SECONDS", default_value_t = 30)]
    pub compensation_retry_seconds: u64,

    /// Maximum compensations settled per retry
    #[arg(long, env = "COMPENSATION_BATCH_SIZE", default_value_t = 100)]
    pub compensation_batch_size: u32,
}

/// Runtime knobs derived from [`CheckoutConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub order_timeout: Duration,
    pub compensation_retry_interval: Duration,
    pub compensation_batch_size: u32,
}

impl CheckoutConfig {
    /// Build the pricing policy.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown currency or a negative tax rate.
    pub fn pricing(&self) -> Result<PricingPolicy, PricingError> {
        PricingPolicy::new(
            &self.currency,
            self.free_shipping_threshold,
            self.flat_shipping_fee,
            self.tax_percent,
        )
    }

    #[must_use]
    pub fn settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            cache_ttl: Duration::from_secs(self.validation_cache_ttl_seconds),
            cache_sweep_interval: Duration::from_secs(self.validation_cache_sweep_seconds.max(1)),
            order_timeout: Duration::from_millis(self.order_timeout_ms),
            compensation_retry_interval: Duration::from_secs(
                self.compensation_retry_seconds.max(1),
            ),
            compensation_batch_size: self.compensation_batch_size.max(1),
        }
    }
}
