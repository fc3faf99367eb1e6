//! Fee allocation and accounting-currency conversions.
//!
//! Everything here is computed in two steps. First a value such as [`FeeAllocation`] is derived from the order,
//! calling out to the collaborators for every conversion. Only when every figure is known is it applied to the order,
//! so a failed conversion never leaves an order with a partial set of fee buckets.
use log::*;
use psp_common::Amount;

use crate::{
    db_types::{FeeBucket, Order, PaymentMethodSnapshot},
    psp_api::{
        collaborators::Collaborators,
        errors::{OrderFlowError, SystemError},
    },
    traits::CommissionSplit,
};

/// The fee buckets for an order, plus the amount the payer is charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeAllocation {
    pub commission: CommissionSplit,
    pub vat_amount: Amount,
    /// The payment method amount after VAT and any commission shifted onto the payer
    pub payer_amount: Amount,
    pub project_fee: FeeBucket,
    pub psp_fee: FeeBucket,
    pub payment_system_fee: FeeBucket,
    pub payer_fee: Option<FeeBucket>,
}

impl FeeAllocation {
    pub fn apply(self, order: &mut Order) {
        order.vat_amount = self.vat_amount;
        order.payment_method_outcome_amount = self.payer_amount;
        order.project_fee = Some(self.project_fee);
        order.psp_fee = Some(self.psp_fee);
        order.payment_system_fee = Some(self.payment_system_fee);
        order.payer_fee = self.payer_fee;
    }
}

/// An order's amounts in each party's accounting currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountingAmounts {
    pub psp: Amount,
    pub merchant_out: Amount,
    pub payment_system: Amount,
}

impl AccountingAmounts {
    pub fn apply(self, order: &mut Order) {
        order.amount_in_psp_accounting_currency = self.psp;
        order.amount_out_merchant_accounting_currency = self.merchant_out;
        order.amount_in_payment_system_accounting_currency = self.payment_system;
    }
}

/// The amounts derived from a payment system's settlement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementAmounts {
    pub project_outcome: Amount,
    pub accounting: AccountingAmounts,
}

impl SettlementAmounts {
    pub fn apply(self, order: &mut Order) {
        order.project_outcome_amount = self.project_outcome;
        self.accounting.apply(order);
    }
}

pub struct FeeEngine<'a> {
    collaborators: &'a Collaborators,
    psp_accounting_currency: &'a str,
}

impl<'a> FeeEngine<'a> {
    pub fn new(collaborators: &'a Collaborators, psp_accounting_currency: &'a str) -> Self {
        Self { collaborators, psp_accounting_currency }
    }

    async fn convert(&self, from: &str, to: &str, amount: Amount) -> Result<Amount, SystemError> {
        self.collaborators.rates.convert(from, to, amount).await.map_err(|e| {
            error!("🧮️ Could not convert {amount} {from} to {to}. {e}");
            SystemError::from(e)
        })
    }

    /// Computes the commissions, VAT and payer amount for an order with a selected payment method.
    ///
    /// The split is requested for the payment method amount *before* VAT. The project owes the payment method and PSP
    /// commissions, less whatever part of it is shifted onto the payer when the merchant has enabled that.
    pub async fn allocate(&self, order: &Order) -> Result<FeeAllocation, OrderFlowError> {
        let pm = payment_method(order)?;
        let merchant = &order.project.merchant;
        let merchant_currency = merchant.accounting_currency.as_str();
        let pm_currency = pm.currency.as_str();
        let base_amount = order.payment_method_outcome_amount;
        let mut payer_amount = base_amount;

        let mut vat_amount = Amount::zero();
        if merchant.is_vat_enabled {
            let country = order.payer_data.country.as_deref().unwrap_or_default();
            let subdivision = order.payer_data.subdivision.as_deref();
            vat_amount = self.collaborators.vat.calculate_vat(country, subdivision, base_amount).await.map_err(|e| {
                error!("🧮️ Could not calculate VAT for order {} (country '{country}'). {e}", order.id);
                SystemError::from(e)
            })?;
            payer_amount += vat_amount;
        }

        let commission =
            self.collaborators.commissions.calculate_commission(&order.project.id, &pm.id, base_amount).await.map_err(
                |e| {
                    error!("🧮️ Could not calculate the commission for order {}. {e}", order.id);
                    SystemError::from(e)
                },
            )?;
        let mut project_total = commission.total();

        let payer_fee = if merchant.is_commission_to_user_enabled {
            project_total -= commission.to_user;
            payer_amount += commission.to_user;
            let merchant_amount = self.convert(pm_currency, merchant_currency, commission.to_user).await?;
            Some(FeeBucket::new(commission.to_user).with_merchant_amount(merchant_amount))
        } else {
            None
        };

        let project_fee = FeeBucket::new(project_total)
            .with_merchant_amount(self.convert(pm_currency, merchant_currency, project_total).await?);
        let psp_fee = FeeBucket::new(commission.psp)
            .with_merchant_amount(self.convert(pm_currency, merchant_currency, commission.psp).await?)
            .with_psp_amount(self.convert(pm_currency, self.psp_accounting_currency, commission.psp).await?);
        let ps_currency = pm.payment_system.accounting_currency.as_str();
        let payment_system_fee = FeeBucket::new(commission.payment_method)
            .with_payment_system_amount(self.convert(pm_currency, ps_currency, commission.payment_method).await?)
            .with_merchant_amount(self.convert(pm_currency, merchant_currency, commission.payment_method).await?);

        debug!(
            "🧮️ Fees for order {}: commission {} {pm_currency} (pm {}, psp {}, payer {}), VAT {vat_amount}, payer pays \
             {payer_amount}",
            order.id,
            commission.total(),
            commission.payment_method,
            commission.psp,
            payer_fee.as_ref().map(|f| f.amount_payment_method_currency).unwrap_or_default(),
        );
        Ok(FeeAllocation {
            commission,
            vat_amount,
            payer_amount,
            project_fee,
            psp_fee,
            payment_system_fee,
            payer_fee,
        })
    }

    /// Runs [`Self::allocate`] and applies the result to the order.
    pub async fn process_order_commissions(&self, order: &mut Order) -> Result<(), OrderFlowError> {
        let allocation = self.allocate(order).await?;
        allocation.apply(order);
        Ok(())
    }

    async fn check_psp_currency(&self) -> Result<(), OrderFlowError> {
        if self.collaborators.currencies.fetch_currency(self.psp_accounting_currency).await?.is_none() {
            error!("🧮️ The PSP accounting currency {} is not in the currency catalog", self.psp_accounting_currency);
            return Err(SystemError::PspAccountingCurrencyMissing.into());
        }
        Ok(())
    }

    /// The order's amounts in the PSP's, merchant's and payment system's accounting currencies, as priced when the
    /// payment is created.
    pub async fn accounting_amounts(&self, order: &Order) -> Result<AccountingAmounts, OrderFlowError> {
        let pm = payment_method(order)?;
        self.check_psp_currency().await?;
        let pm_amount = order.payment_method_outcome_amount;
        let pm_currency = order.payment_method_outcome_currency.as_deref().unwrap_or(pm.currency.as_str());
        let psp = self.convert(pm_currency, self.psp_accounting_currency, pm_amount).await?;
        let merchant_out = self
            .convert(
                &order.project_income_currency,
                &order.project.merchant.accounting_currency,
                order.project_income_amount,
            )
            .await?;
        let payment_system =
            self.convert(pm_currency, &pm.payment_system.accounting_currency, pm_amount).await?;
        Ok(AccountingAmounts { psp, merchant_out, payment_system })
    }

    /// Re-prices a settled order from what the payment system actually received.
    ///
    /// Every figure is converted from `payment_method_income_amount` in `payment_method_income_currency`: the project
    /// outcome into the order's outcome currency, and the accounting amounts into the PSP's, merchant's and payment
    /// system's currencies.
    pub async fn settlement_amounts(&self, order: &Order) -> Result<SettlementAmounts, OrderFlowError> {
        let pm = payment_method(order)?;
        let income_currency = order.payment_method_income_currency.as_deref().unwrap_or_default();
        let income = order.payment_method_income_amount;
        let project_outcome = self.convert(income_currency, &order.project_outcome_currency, income).await?;
        self.check_psp_currency().await?;
        let psp = self.convert(income_currency, self.psp_accounting_currency, income).await?;
        let merchant_out = self.convert(income_currency, &order.project.merchant.accounting_currency, income).await?;
        let payment_system = self.convert(income_currency, &pm.payment_system.accounting_currency, income).await?;
        trace!("🧮️ Order {} settled with {income} {income_currency}", order.id);
        Ok(SettlementAmounts { project_outcome, accounting: AccountingAmounts { psp, merchant_out, payment_system } })
    }
}

fn payment_method(order: &Order) -> Result<&PaymentMethodSnapshot, SystemError> {
    order.payment_method.as_ref().ok_or_else(|| {
        error!("🧮️ Order {} has no payment method. Its fees cannot be calculated.", order.id);
        SystemError::MissingPaymentMethod(order.id.clone())
    })
}
