use std::fmt::Display;

use chrono::{DateTime, Utc};
use log::*;
use psp_common::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::traits::{ExchangeRateError, ExchangeRateStore};

/// A quoted exchange rate: one unit of `base_currency` buys `rate` units of `quote_currency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base_currency: String,
    pub quote_currency: String,
    /// Unrounded. Rounding happens once, on the converted amount.
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(base: &str, quote: &str, rate: Decimal, updated_at: Option<DateTime<Utc>>) -> Self {
        let updated_at = updated_at.unwrap_or_else(Utc::now);
        Self { base_currency: base.to_string(), quote_currency: quote.to_string(), rate, updated_at }
    }

    /// A rate of one, for converting a currency into itself.
    pub fn parity(currency: &str) -> Self {
        Self::new(currency, currency, Decimal::ONE, None)
    }

    fn pair(&self) -> String {
        format!("{}/{}", self.base_currency, self.quote_currency)
    }

    /// Convert an amount in the base currency into the quote currency.
    pub fn convert(&self, amount: Amount) -> Result<Amount, ExchangeRateError> {
        if self.rate <= Decimal::ZERO {
            return Err(ExchangeRateError::InvalidRate(self.pair()));
        }
        amount.scale(self.rate).ok_or_else(|| ExchangeRateError::Overflow { pair: self.pair(), amount })
    }

    /// The rate for the opposite direction.
    pub fn inverse(&self) -> Result<Self, ExchangeRateError> {
        let rate = Decimal::ONE.checked_div(self.rate).filter(|r| !r.is_zero() && self.rate > Decimal::ZERO);
        let rate = rate.ok_or_else(|| ExchangeRateError::InvalidRate(self.pair()))?;
        Ok(Self {
            base_currency: self.quote_currency.clone(),
            quote_currency: self.base_currency.clone(),
            rate,
            updated_at: self.updated_at,
        })
    }

    /// Converts `amount` from `from` to `to` using the rates held in `store`.
    ///
    /// A same-currency conversion is the identity. Otherwise the direct rate is used if it exists, and the inverse of
    /// the opposite pair if it does not.
    pub async fn convert_with<S: ExchangeRateStore>(
        store: &S,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<Amount, ExchangeRateError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }
        let rate = match store.fetch_last_rate(from, to).await {
            Ok(rate) => rate,
            Err(ExchangeRateError::RateDoesNotExist(_)) => {
                trace!("💱️ No direct {from}/{to} rate. Trying the inverse of {to}/{from}");
                store.fetch_last_rate(to, from).await?.inverse()?
            },
            Err(e) => return Err(e),
        };
        rate.convert(amount)
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1 {} => {} {}", self.base_currency, self.rate, self.quote_currency)
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn convert_and_display() {
        let rate = ExchangeRate::new("USD", "RUB", dec!(65), None);
        assert_eq!(rate.convert(Amount::from(100)).unwrap(), Amount::from(6500));
        assert_eq!(format!("{rate}"), "1 USD => 65 RUB");
        let parity = ExchangeRate::parity("EUR");
        assert_eq!(parity.convert(Amount::new(dec!(12.345))).unwrap(), Amount::new(dec!(12.35)));
    }

    #[test]
    fn oversized_amounts_are_an_error() {
        let rate = ExchangeRate::new("USD", "RUB", dec!(1000), None);
        let amount: Amount = "700000000000000000000000000".parse().unwrap();
        let err = rate.convert(amount).unwrap_err();
        assert!(matches!(err, ExchangeRateError::Overflow { ref pair, .. } if pair == "USD/RUB"));
    }

    #[test]
    fn inverse_rate() {
        let rate = ExchangeRate::new("EUR", "USD", dec!(1.25), None);
        let inverse = rate.inverse().unwrap();
        assert_eq!(inverse.base_currency, "USD");
        assert_eq!(inverse.quote_currency, "EUR");
        assert_eq!(inverse.rate, dec!(0.8));
        assert!(ExchangeRate::new("EUR", "USD", Decimal::ZERO, None).inverse().is_err());
        assert!(ExchangeRate::new("EUR", "USD", dec!(-1), None).convert(Amount::from(1)).is_err());
    }

    #[test]
    fn round_trip_stays_within_rounding_tolerance() {
        let tolerance = Amount::new(dec!(0.01));
        for r in [dec!(65), dec!(0.0153), dec!(1.0842), dec!(3.3333), dec!(97.5)] {
            let rate = ExchangeRate::new("AAA", "BBB", r, None);
            let inverse = rate.inverse().unwrap();
            for x in [dec!(0.01), dec!(1), dec!(99.99), dec!(1234.56)] {
                let x = Amount::new(x);
                let back = inverse.convert(rate.convert(x).unwrap()).unwrap();
                let diff = if back > x { back - x } else { x - back };
                // the forward leg loses at most half a cent, which the inverse scales by 1/r
                let bound = Amount::new((tolerance.value() / r).max(tolerance.value()));
                assert!(diff <= bound, "{x} -> {back} at rate {r}");
            }
        }
    }
}
