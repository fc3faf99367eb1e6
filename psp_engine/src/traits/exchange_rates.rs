use async_trait::async_trait;
use psp_common::Amount;
use thiserror::Error;

use crate::psp_api::exchange_objects::ExchangeRate;

#[derive(Debug, Clone, Error)]
pub enum ExchangeRateError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested exchange rate does not exist: {0}")]
    RateDoesNotExist(String),
    #[error("Exchange rate {0} cannot be used for conversion")]
    InvalidRate(String),
    #[error("Converting {amount} at {pair} overflows")]
    Overflow { pair: String, amount: Amount },
}

/// Converts an amount between two currencies, identified by their ISO-4217 alphabetic codes.
///
/// Implementations must treat a same-currency conversion as the identity, and must return an amount in its stored,
/// rounded representation.
#[async_trait]
pub trait ExchangeRates: Send + Sync {
    async fn convert(&self, from: &str, to: &str, amount: Amount) -> Result<Amount, ExchangeRateError>;
}

/// Storage for exchange rates. Backends that keep rates implement this, and get [`ExchangeRates`] on top of it via
/// [`ExchangeRate::convert_with`].
#[allow(async_fn_in_trait)]
pub trait ExchangeRateStore {
    /// Fetch the last exchange rate for the given pair. If the rate does not exist, the error
    /// [`ExchangeRateError::RateDoesNotExist`] is returned.
    async fn fetch_last_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, ExchangeRateError>;
    /// Save the exchange rate to the backend storage
    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError>;
}
