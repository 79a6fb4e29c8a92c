//! Currency arithmetic.
//!
//! Amounts are exact decimals. Intermediate results keep full precision;
//! [`Money::rounded`] turns an amount into a charged or displayed figure
//! (two decimals, midpoint away from zero).

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// Number of decimals in a charged amount.
const CENT_SCALE: u32 = 2;

/// An exact currency amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates an amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, CENT_SCALE))
    }

    /// Creates an amount from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Rounds to cents, midpoint away from zero.
    pub fn rounded(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Returns the rounded amount in cents, or None if it does not fit an i64.
    pub fn to_cents(&self) -> Option<i64> {
        (self.rounded().0 * Decimal::ONE_HUNDRED).to_i64()
    }

    /// Multiplies by a quantity.
    pub fn times(&self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }

    /// Applies a rate without rounding.
    pub fn apply_rate(&self, rate: Rate) -> Money {
        Money(self.0 * rate.0)
    }

    /// Clamps negative amounts to zero.
    pub fn non_negative(&self) -> Money {
        if self.0.is_sign_negative() {
            Money::ZERO
        } else {
            *self
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut amount = self.rounded().0;
        amount.rescale(CENT_SCALE);
        if amount.is_sign_negative() && !amount.is_zero() {
            write!(f, "-€{}", amount.abs())
        } else {
            write!(f, "€{}", amount.abs())
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

/// A fractional rate such as a tax rate or a discount (0.23 = 23%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    pub fn new(rate: Decimal) -> Self {
        Self(rate)
    }

    /// Creates a rate from a whole percentage.
    pub fn percent(percent: u32) -> Self {
        Self(Decimal::new(i64::from(percent), 2))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_midpoint_away_from_zero() {
        let amount = Money::new(Decimal::new(9225, 3));
        assert_eq!(amount.rounded(), Money::from_cents(923));
        assert_eq!(Money::new(Decimal::new(-9225, 3)).rounded(), Money::from_cents(-923));
        assert_eq!(Money::new(Decimal::new(9224, 3)).rounded(), Money::from_cents(922));
    }

    #[test]
    fn tax_keeps_full_precision_until_rounded() {
        let tax = Money::from_cents(750).apply_rate(Rate::percent(23));
        assert_eq!(tax.amount(), Decimal::new(1725, 3));
        assert_eq!(tax.rounded().to_cents(), Some(173));
    }

    #[test]
    fn display_always_shows_two_decimals() {
        assert_eq!(Money::from_units(5).to_string(), "€5.00");
        assert_eq!(Money::new(Decimal::new(9225, 3)).to_string(), "€9.23");
        assert_eq!(Money::from_cents(-150).to_string(), "-€1.50");
    }

    #[test]
    fn non_negative_clamps() {
        assert_eq!((Money::from_cents(100) - Money::from_cents(250)).non_negative(), Money::ZERO);
        assert_eq!(Money::from_cents(100).non_negative(), Money::from_cents(100));
    }

    #[test]
    fn sums_and_multiplies() {
        let total: Money = [Money::from_cents(350).times(2), Money::from_cents(50)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(750));
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::from_cents(923)).unwrap();
        assert_eq!(json, "\"9.23\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_cents(923));
    }

    #[test]
    fn rate_display() {
        assert_eq!(Rate::percent(23).to_string(), "23%");
        assert_eq!(Rate::new(Decimal::new(5, 2)).to_string(), "5%");
    }
}
