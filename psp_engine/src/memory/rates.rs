use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::*;
use psp_common::Amount;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{
    psp_api::exchange_objects::ExchangeRate,
    traits::{ExchangeRateError, ExchangeRateStore, ExchangeRates},
};

/// The latest exchange rate for each currency pair, held in memory.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: Arc<RwLock<HashMap<(String, String), ExchangeRate>>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rate at which one unit of `base` buys `rate` units of `quote`.
    pub async fn set_rate(&self, base: &str, quote: &str, rate: Decimal) -> Result<(), ExchangeRateError> {
        self.set_exchange_rate(&ExchangeRate::new(base, quote, rate, None)).await
    }
}

fn key(base: &str, quote: &str) -> (String, String) {
    (base.to_ascii_uppercase(), quote.to_ascii_uppercase())
}

impl ExchangeRateStore for RateTable {
    async fn fetch_last_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let rates = self.rates.read().await;
        rates
            .get(&key(base, quote))
            .cloned()
            .ok_or_else(|| ExchangeRateError::RateDoesNotExist(format!("{base}/{quote}")))
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        if rate.rate <= Decimal::ZERO {
            return Err(ExchangeRateError::InvalidRate(rate.to_string()));
        }
        debug!("💱️ Exchange rate set: {rate}");
        self.rates.write().await.insert(key(&rate.base_currency, &rate.quote_currency), rate.clone());
        Ok(())
    }
}

#[async_trait]
impl ExchangeRates for RateTable {
    async fn convert(&self, from: &str, to: &str, amount: Amount) -> Result<Amount, ExchangeRateError> {
        ExchangeRate::convert_with(self, from, to, amount).await
    }
}
