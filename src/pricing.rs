//! Pricing
//!
//! Effective unit prices and the order totals computed at checkout time.

use std::num::TryFromIntError;

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso};
use thiserror::Error;

use crate::items::PricedLine;

/// Errors that can occur while calculating prices and totals.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The currency code is not a known ISO currency.
    #[error("unknown currency `{0}`")]
    UnknownCurrency(String),

    /// The tax rate is negative.
    #[error("tax rate cannot be negative")]
    NegativeTaxRate,

    /// An amount does not fit the signed minor-unit representation.
    #[error("amount out of range")]
    InvalidAmount(#[from] TryFromIntError),

    /// Arithmetic overflowed.
    #[error("amount overflowed")]
    Overflow,

    /// A line's currency differs from the policy currency.
    #[error("line has currency {0}, but the policy uses {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// The price a customer pays for one unit: the lesser of the list price and a positive
/// discount price.
pub fn effective_unit_price(price: u64, discount_price: Option<u64>) -> u64 {
    match discount_price {
        Some(discount) if discount > 0 && discount < price => discount,
        _ => price,
    }
}

/// Computed money totals of an order, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    /// Sum of `unit price × quantity` over every line
    pub items_total: u64,

    /// Flat fee, or zero above the free-shipping threshold
    pub shipping_charge: u64,

    /// Tax on `items_total`
    pub tax: u64,

    /// `items_total + shipping_charge + tax`
    pub total_amount: u64,
}

impl OrderTotals {
    /// Whether `total_amount` equals the sum of its parts.
    pub fn is_consistent(&self) -> bool {
        self.items_total
            .checked_add(self.shipping_charge)
            .and_then(|sum| sum.checked_add(self.tax))
            == Some(self.total_amount)
    }
}

/// Shipping and tax rules applied when an order is created.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    currency: &'static iso::Currency,
    free_shipping_threshold: u64,
    flat_shipping_fee: u64,
    tax_rate: Decimal,
}

impl PricingPolicy {
    /// Create a new policy. `tax_percent` is given in percent points (`10` means 10%).
    ///
    /// # Errors
    ///
    /// - [`PricingError::UnknownCurrency`]: `currency` is not an ISO 4217 code.
    /// - [`PricingError::NegativeTaxRate`]: `tax_percent` is below zero.
    pub fn new(
        currency: &str,
        free_shipping_threshold: u64,
        flat_shipping_fee: u64,
        tax_percent: Decimal,
    ) -> Result<Self, PricingError> {
        let currency = iso::find(currency)
            .ok_or_else(|| PricingError::UnknownCurrency(currency.to_string()))?;

        if tax_percent.is_sign_negative() && !tax_percent.is_zero() {
            return Err(PricingError::NegativeTaxRate);
        }

        Ok(Self {
            currency,
            free_shipping_threshold,
            flat_shipping_fee,
            tax_rate: tax_percent / Decimal::ONE_HUNDRED,
        })
    }

    /// Policy currency
    pub fn currency(&self) -> &'static iso::Currency {
        self.currency
    }

    /// Tax rate as a fraction (`0.1` for 10%)
    pub fn tax_rate(&self) -> Percentage {
        Percentage::from(self.tax_rate)
    }

    /// Shipping is free once `items_total` is strictly above the threshold.
    pub fn shipping_charge(&self, items_total: u64) -> u64 {
        if items_total > self.free_shipping_threshold {
            0
        } else {
            self.flat_shipping_fee
        }
    }

    /// Tax on `items_total`, rounded half away from zero to whole minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the result cannot be represented.
    pub fn tax(&self, items_total: u64) -> Result<u64, PricingError> {
        let Some(amount) = Decimal::from_u64(items_total) else {
            return Err(PricingError::Overflow);
        };

        let applied = self.tax_rate() * amount;
        let rounded = applied.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        rounded.to_u64().ok_or(PricingError::Overflow)
    }

    /// Sum the lines in the policy currency.
    ///
    /// # Errors
    ///
    /// - [`PricingError::CurrencyMismatch`]: a line is priced in another currency.
    /// - [`PricingError::Overflow`]: a line total overflows.
    /// - [`PricingError::Money`]: wrapped money arithmetic error.
    pub fn items_total<'a>(
        &self,
        lines: &[PricedLine<'a>],
    ) -> Result<Money<'a, iso::Currency>, PricingError> {
        lines
            .iter()
            .try_fold(Money::from_minor(0, self.currency), |acc, line| {
                let line_currency = line.unit_price().currency();

                if line_currency != self.currency {
                    return Err(PricingError::CurrencyMismatch(
                        line_currency.iso_alpha_code,
                        self.currency.iso_alpha_code,
                    ));
                }

                Ok(acc.add(line.line_total()?)?)
            })
    }

    /// Compute the full totals of an order from its priced lines.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`PricingPolicy::items_total`] and [`PricingPolicy::tax`].
    pub fn totals(&self, lines: &[PricedLine<'_>]) -> Result<OrderTotals, PricingError> {
        let items_total = u64::try_from(self.items_total(lines)?.to_minor_units())?;
        let shipping_charge = self.shipping_charge(items_total);
        let tax = self.tax(items_total)?;

        let total_amount = items_total
            .checked_add(shipping_charge)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or(PricingError::Overflow)?;

        Ok(OrderTotals {
            items_total,
            shipping_charge,
            tax,
            total_amount,
        })
    }

    /// Convenience wrapper over [`PricingPolicy::totals`] for `(unit price, quantity)` pairs in
    /// minor units of the policy currency.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`PricingPolicy::totals`].
    pub fn totals_from_minor(
        &self,
        lines: impl IntoIterator<Item = (u64, u32)>,
    ) -> Result<OrderTotals, PricingError> {
        let lines = lines
            .into_iter()
            .map(|(unit_price, quantity)| PricedLine::from_minor(unit_price, quantity, self.currency))
            .collect::<Result<Vec<_>, _>>()?;

        self.totals(&lines)
    }
}
