use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Money type with 6 decimal places of internal precision.
///
/// Schedules and persisted balances round to 2 places (centavos) at the
/// boundary; the extra places keep intermediate interest math stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(6))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s)?.round_dp(6)))
    }

    /// create from whole currency units (pesos)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// round to specified decimal places
    pub fn round_dp(&self, dp: u32) -> Self {
        Money(self.0.round_dp(dp))
    }

    /// round to centavos, the persisted currency precision
    pub fn to_currency(&self) -> Self {
        self.round_dp(2)
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// check if strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// check if negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// absolute value
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// count of significant digits, sign and decimal point excluded
    ///
    /// Mirrors the storage ceiling on monetary columns (12 digits total).
    pub fn digit_count(&self) -> usize {
        self.0
            .normalize()
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .count()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(6))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = (self.0 + other.0).round_dp(6);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money((self.0 - other.0).round_dp(6))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = (self.0 - other.0).round_dp(6);
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money((self.0 * other).round_dp(6))
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    fn div(self, other: Decimal) -> Money {
        Money((self.0 / other).round_dp(6))
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

/// rate type for annual and periodic interest rates
///
/// Stored as a fraction: 0.355 means 35.5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from decimal fraction (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 5 for 5%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    /// get as decimal fraction
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// get as percentage
    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }

    /// check if negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// fraction form of a value that may have been supplied as a percentage
    ///
    /// Any value greater than 1 is divided by 100, so the authoritative
    /// stored rate is always in [0, 1].
    pub fn normalized(&self) -> Rate {
        if self.0 > Decimal::ONE {
            Rate(self.0 / Decimal::from(100))
        } else {
            *self
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_internal_precision() {
        let m = Money::from_str_exact("100.1234567").unwrap();
        assert_eq!(m.to_string(), "100.123457"); // rounded to 6 places
    }

    #[test]
    fn test_currency_rounding() {
        let m = Money::from_decimal(dec!(888.48786));
        assert_eq!(m.to_currency(), Money::from_decimal(dec!(888.49)));
    }

    #[test]
    fn test_digit_count_ignores_sign_and_point() {
        assert_eq!(Money::from_decimal(dec!(-12345.67)).digit_count(), 7);
        assert_eq!(Money::from_major(1_000_000_000).digit_count(), 10);
        // trailing zeros after the point do not inflate the count
        assert_eq!(Money::from_decimal(dec!(100.00)).digit_count(), 3);
    }

    #[test]
    fn test_rate_normalization() {
        assert_eq!(
            Rate::from_decimal(dec!(35.5)).normalized(),
            Rate::from_decimal(dec!(0.355))
        );
        assert_eq!(
            Rate::from_decimal(dec!(0.355)).normalized(),
            Rate::from_decimal(dec!(0.355))
        );
        assert_eq!(Rate::ONE.normalized(), Rate::ONE);
    }

    #[test]
    fn test_rate_percentage_display() {
        let r = Rate::from_percentage(12);
        assert_eq!(r.as_decimal(), dec!(0.12));
        assert_eq!(r.to_string(), "12%");
    }
}
