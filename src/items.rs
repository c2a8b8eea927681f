//! Items

use rusty_money::{Money, iso};

use crate::pricing::PricingError;

/// A priced order line: an authoritative unit price and a quantity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PricedLine<'a> {
    unit_price: Money<'a, iso::Currency>,
    quantity: u32,
}

impl<'a> PricedLine<'a> {
    /// Creates a new line with the given unit price and quantity
    pub fn new(unit_price: Money<'a, iso::Currency>, quantity: u32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    /// Creates a new line from a unit price in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::InvalidAmount`] when the amount does not fit in an `i64`.
    pub fn from_minor(
        unit_price: u64,
        quantity: u32,
        currency: &'a iso::Currency,
    ) -> Result<Self, PricingError> {
        let minor = i64::try_from(unit_price)?;

        Ok(Self::new(Money::from_minor(minor, currency), quantity))
    }

    /// Returns the unit price of the line
    pub fn unit_price(&self) -> &Money<'a, iso::Currency> {
        &self.unit_price
    }

    /// Returns the quantity of the line
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] when the product overflows.
    pub fn line_total(&self) -> Result<Money<'a, iso::Currency>, PricingError> {
        let total = self
            .unit_price
            .to_minor_units()
            .checked_mul(i64::from(self.quantity))
            .ok_or(PricingError::Overflow)?;

        Ok(Money::from_minor(total, self.unit_price.currency()))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn line_total_multiplies_unit_price() -> TestResult {
        let line = PricedLine::from_minor(100, 3, iso::USD)?;

        assert_eq!(line.line_total()?, Money::from_minor(300, iso::USD));

        Ok(())
    }

    #[test]
    fn from_minor_rejects_amounts_beyond_i64() {
        let result = PricedLine::from_minor(u64::MAX, 1, iso::USD);

        assert!(
            matches!(result, Err(PricingError::InvalidAmount(_))),
            "expected InvalidAmount, got {result:?}"
        );
    }

    #[test]
    fn line_total_reports_overflow() -> TestResult {
        let line = PricedLine::from_minor(u64::try_from(i64::MAX)?, 2, iso::USD)?;

        assert!(matches!(line.line_total(), Err(PricingError::Overflow)));

        Ok(())
    }
}
