use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

/// Every stored monetary value carries exactly this many decimal places.
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount in some (externally tracked) currency.
///
/// All constructors round to two decimal places, midpoint away from zero, so an `Amount` is always in its stored
/// representation. Addition and subtraction of two amounts cannot introduce extra precision, so they are not
/// re-rounded. Multiplying by an arbitrary [`Decimal`] (e.g. an exchange rate) rounds the result once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, AddAssign, add_assign);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        let mut value = value.round_dp_with_strategy(AMOUNT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        value.rescale(AMOUNT_DECIMAL_PLACES);
        Self(value)
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Build an amount from minor units, e.g. cents.
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, AMOUNT_DECIMAL_PLACES))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The amount in minor units. `None` if it does not fit in an `i64`.
    pub fn to_minor(&self) -> Option<i64> {
        i64::try_from(self.0.mantissa()).ok()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Multiply by an unrounded factor and round the product. Returns `None` if the product overflows.
    pub fn scale(&self, factor: Decimal) -> Option<Self> {
        self.0.checked_mul(factor).map(Self::new)
    }

    /// Divide by an unrounded divisor and round the quotient. Returns `None` for a zero divisor.
    pub fn checked_div(&self, divisor: Decimal) -> Option<Self> {
        self.0.checked_div(divisor).map(Self::new)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self::new(Decimal::from(value))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value is not a valid monetary amount: {0}")]
pub struct AmountParseError(String);

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| AmountParseError(format!("{s}. {e}")))?;
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn amounts_are_rounded_half_away_from_zero() {
        assert_eq!(Amount::new(dec!(1.005)), Amount::from_minor(101));
        assert_eq!(Amount::new(dec!(1.004)), Amount::from_minor(100));
        assert_eq!(Amount::new(dec!(-1.005)), Amount::from_minor(-101));
        assert_eq!(Amount::from(12).to_string(), "12.00");
        assert_eq!(Amount::from_minor(1250).to_string(), "12.50");
        assert_eq!((Amount::from(12) - Amount::new(dec!(0.5))).to_minor(), Some(1150));
    }

    #[test]
    fn arithmetic() {
        let a = Amount::from(100);
        let b = Amount::from_minor(1_050);
        assert_eq!(a + b, Amount::from_minor(11_050));
        assert_eq!(a - b, Amount::from_minor(8_950));
        let mut c = a;
        c -= b;
        c += b;
        assert_eq!(c, a);
        assert_eq!(-b, Amount::from_minor(-1_050));
        let total: Amount = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Amount::from_minor(12_100));
        assert_eq!(a.scale(dec!(0.015384615)), Some(Amount::from_minor(154)));
        assert!(a.checked_div(Decimal::ZERO).is_none());
    }

    #[test]
    fn scaling_past_the_decimal_range_fails() {
        let huge: Amount = "700000000000000000000000000".parse().unwrap();
        assert_eq!(huge.scale(dec!(1000)), None);
        assert_eq!(huge.scale(dec!(0.01)), Some("7000000000000000000000000".parse().unwrap()));
    }

    #[test]
    fn parse_and_serialize() {
        let a: Amount = "99.999".parse().unwrap();
        assert_eq!(a, Amount::from(100));
        assert!("ten".parse::<Amount>().is_err());
        let json = serde_json::to_string(&Amount::from_minor(650_000)).unwrap();
        assert_eq!(json, "\"6500.00\"");
        let back: Amount = serde_json::from_str("\"12.345\"").unwrap();
        assert_eq!(back, Amount::from_minor(1235));
    }
}
