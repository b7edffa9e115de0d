use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

/// A two-decimal currency amount. Rounding is half-up (away from zero),
/// which is what the printed statements and reports expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(round_half_up(decimal))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }
}

/// Round to two decimal places, midpoints away from zero.
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn from_decimal_rounds_half_up() {
        assert_eq!(Money::from_decimal(dec("15.005")).to_string(), "15.01");
        assert_eq!(Money::from_decimal(dec("15.004")).to_string(), "15.00");
        assert_eq!(Money::from_decimal(dec("-2.345")).to_string(), "-2.35");
    }

    #[test]
    fn display_pads_to_two_places() {
        assert_eq!(Money::from_cents(1500).to_string(), "15.00");
        assert_eq!(Money::from_decimal(dec("7")).to_string(), "7.00");
    }

    #[test]
    fn sign_helpers() {
        let m = Money::from_cents(-5000);
        assert!(m.is_negative());
        assert!(!m.is_positive());
        assert_eq!(m.abs(), Money::from_cents(5000));
        assert!(!Money::zero().is_positive());
        assert!(!Money::zero().is_negative());
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [100, 250, -50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total, Money::from_cents(300));
    }
}
