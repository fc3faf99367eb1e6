use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use psp_common::Amount;
use serde::{Deserialize, Serialize};

use crate::db_types::{FeeBucket, FixedPackageSnapshot, Order, PaymentMethodSnapshot, ProjectSnapshot};

/// The cross-service projection of an order, published when a payment-system notification finalizes it.
///
/// Passthrough parameters are flattened to strings, and the status is carried as its numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: String,
    pub project: ProjectSnapshot,
    pub project_order_id: Option<String>,
    pub project_account: String,
    pub description: String,
    pub project_income_amount: Amount,
    pub project_income_currency: String,
    pub project_outcome_amount: Amount,
    pub project_outcome_currency: String,
    pub project_params: BTreeMap<String, String>,
    pub payment_method: Option<PaymentMethodSnapshot>,
    pub payment_method_order_id: Option<String>,
    pub payment_method_payer_account: Option<String>,
    pub payment_method_outcome_amount: Amount,
    pub payment_method_outcome_currency: Option<String>,
    pub payment_method_income_amount: Amount,
    pub payment_method_income_currency: Option<String>,
    pub payment_method_txn_params: BTreeMap<String, String>,
    pub payment_requisites: BTreeMap<String, String>,
    pub fixed_package: Option<FixedPackageSnapshot>,
    pub status: i32,
    pub is_json_request: bool,
    pub vat_amount: Amount,
    pub amount_in_psp_accounting_currency: Amount,
    pub amount_in_merchant_accounting_currency: Amount,
    pub amount_out_merchant_accounting_currency: Amount,
    pub amount_in_payment_system_accounting_currency: Amount,
    pub project_fee: Option<FeeBucket>,
    pub psp_fee: Option<FeeBucket>,
    pub payment_system_fee: Option<FeeBucket>,
    pub payer_fee: Option<FeeBucket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payment_method_order_closed_at: Option<DateTime<Utc>>,
    pub project_last_requested_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderEvent {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id.to_string(),
            project: o.project.clone(),
            project_order_id: o.project_order_id.clone(),
            project_account: o.project_account.clone(),
            description: o.description.clone(),
            project_income_amount: o.project_income_amount,
            project_income_currency: o.project_income_currency.clone(),
            project_outcome_amount: o.project_outcome_amount,
            project_outcome_currency: o.project_outcome_currency.clone(),
            project_params: o.project_params.to_string_map(),
            payment_method: o.payment_method.clone(),
            payment_method_order_id: o.payment_method_order_id.clone(),
            payment_method_payer_account: o.payment_method_payer_account.clone(),
            payment_method_outcome_amount: o.payment_method_outcome_amount,
            payment_method_outcome_currency: o.payment_method_outcome_currency.clone(),
            payment_method_income_amount: o.payment_method_income_amount,
            payment_method_income_currency: o.payment_method_income_currency.clone(),
            payment_method_txn_params: o.payment_method_txn_params.to_string_map(),
            payment_requisites: o.payment_requisites.clone(),
            fixed_package: o.fixed_package.clone(),
            status: o.status.code(),
            is_json_request: o.is_json_request,
            vat_amount: o.vat_amount,
            amount_in_psp_accounting_currency: o.amount_in_psp_accounting_currency,
            amount_in_merchant_accounting_currency: o.amount_in_merchant_accounting_currency,
            amount_out_merchant_accounting_currency: o.amount_out_merchant_accounting_currency,
            amount_in_payment_system_accounting_currency: o.amount_in_payment_system_accounting_currency,
            project_fee: o.project_fee.clone(),
            psp_fee: o.psp_fee.clone(),
            payment_system_fee: o.payment_system_fee.clone(),
            payer_fee: o.payer_fee.clone(),
            created_at: o.created_at,
            updated_at: o.updated_at,
            payment_method_order_closed_at: o.payment_method_order_closed_at,
            project_last_requested_at: o.project_last_requested_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted after a notification moved an order into a terminal status and the order was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFinalizedEvent {
    pub order: Order,
}

impl OrderFinalizedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
