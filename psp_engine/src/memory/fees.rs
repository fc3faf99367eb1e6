use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::*;
use psp_common::Amount;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{
    db_types::{PaymentMethodId, ProjectId},
    traits::{CommissionCalculator, CommissionError, CommissionSplit, VatCalculator, VatError},
};

/// Commission rates, in percent of the payment amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommissionRates {
    pub payment_method: Decimal,
    pub psp: Decimal,
    /// The share that may be shifted onto the payer
    pub to_user: Decimal,
}

impl CommissionRates {
    pub fn new(payment_method: Decimal, psp: Decimal, to_user: Decimal) -> Self {
        Self { payment_method, psp, to_user }
    }
}

fn percent_of(amount: Amount, percent: Decimal) -> Result<Amount, String> {
    amount.scale(percent / Decimal::ONE_HUNDRED).ok_or_else(|| format!("{percent}% of {amount} overflows"))
}

/// Percentage commissions per project and payment method.
#[derive(Debug, Clone, Default)]
pub struct CommissionTable {
    rates: Arc<RwLock<HashMap<(ProjectId, PaymentMethodId), CommissionRates>>>,
}

impl CommissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rates(&self, project: ProjectId, payment_method: PaymentMethodId, rates: CommissionRates) {
        self.rates.write().await.insert((project, payment_method), rates);
    }
}

#[async_trait]
impl CommissionCalculator for CommissionTable {
    async fn calculate_commission(
        &self,
        project: &ProjectId,
        payment_method: &PaymentMethodId,
        amount: Amount,
    ) -> Result<CommissionSplit, CommissionError> {
        let rates = self.rates.read().await;
        let rates = rates.get(&(project.clone(), payment_method.clone())).ok_or_else(|| {
            CommissionError::NotConfigured { project: project.clone(), payment_method: payment_method.clone() }
        })?;
        let percent = |p| percent_of(amount, p).map_err(CommissionError::ServiceError);
        let split = CommissionSplit::new(percent(rates.payment_method)?, percent(rates.psp)?, percent(rates.to_user)?);
        trace!("🧮️ Commission on {amount} for {project}/{payment_method}: {split:?}");
        Ok(split)
    }
}

/// VAT rates in percent, by country code. A rate for a subdivision (e.g. `US-CA`) takes precedence over its country.
#[derive(Debug, Clone, Default)]
pub struct VatTable {
    rates: Arc<RwLock<HashMap<String, Decimal>>>,
}

impl VatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rate(&self, region: &str, percent: Decimal) {
        self.rates.write().await.insert(region.to_ascii_uppercase(), percent);
    }
}

#[async_trait]
impl VatCalculator for VatTable {
    async fn calculate_vat(
        &self,
        country: &str,
        subdivision: Option<&str>,
        amount: Amount,
    ) -> Result<Amount, VatError> {
        let rates = self.rates.read().await;
        let country = country.to_ascii_uppercase();
        let regional = subdivision.and_then(|s| rates.get(&format!("{country}-{}", s.to_ascii_uppercase())));
        let percent = regional.or_else(|| rates.get(&country)).ok_or_else(|| VatError::RateNotFound(country.clone()))?;
        percent_of(amount, *percent).map_err(VatError::ServiceError)
    }
}
