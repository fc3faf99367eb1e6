use async_trait::async_trait;
use psp_common::Amount;
use thiserror::Error;

use crate::db_types::{PaymentMethodId, ProjectId};

/// The commission owed for a payment, in the payment method's currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommissionSplit {
    /// Commission retained by the payment system
    pub payment_method: Amount,
    /// Commission retained by the PSP
    pub psp: Amount,
    /// The part of the commission that may be shifted onto the payer
    pub to_user: Amount,
}

impl CommissionSplit {
    pub fn new(payment_method: Amount, psp: Amount, to_user: Amount) -> Self {
        Self { payment_method, psp, to_user }
    }

    /// The commission owed by the project before any shifting.
    pub fn total(&self) -> Amount {
        self.payment_method + self.psp
    }
}

#[derive(Debug, Clone, Error)]
pub enum CommissionError {
    #[error("No commission is configured for project {project} and payment method {payment_method}")]
    NotConfigured { project: ProjectId, payment_method: PaymentMethodId },
    #[error("Commission service error: {0}")]
    ServiceError(String),
}

#[async_trait]
pub trait CommissionCalculator: Send + Sync {
    async fn calculate_commission(
        &self,
        project: &ProjectId,
        payment_method: &PaymentMethodId,
        amount: Amount,
    ) -> Result<CommissionSplit, CommissionError>;
}

#[derive(Debug, Clone, Error)]
pub enum VatError {
    #[error("No VAT rate is known for {0}")]
    RateNotFound(String),
    #[error("VAT service error: {0}")]
    ServiceError(String),
}

#[async_trait]
pub trait VatCalculator: Send + Sync {
    /// The VAT due on `amount` for a payer in `country` (and optionally `subdivision`).
    async fn calculate_vat(&self, country: &str, subdivision: Option<&str>, amount: Amount)
        -> Result<Amount, VatError>;
}
