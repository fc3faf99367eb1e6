//! The read view of an order returned by order queries.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use psp_common::Amount;
use serde::{Deserialize, Serialize};

use crate::db_types::{FeeBucket, FixedPackageSnapshot, Order, OrderId, OrderStatusType, PayerData, TxnParamKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBlock {
    pub amount: Amount,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: i32,
    pub name: String,
    pub description: String,
}

impl From<OrderStatusType> for StatusView {
    fn from(s: OrderStatusType) -> Self {
        Self { status: s.code(), name: s.name().to_string(), description: s.description().to_string() }
    }
}

/// A projection of [`Order`] for listings. Optional financial blocks are omitted, never zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub project: SimpleItem,
    pub account: String,
    pub project_order_id: Option<String>,
    pub payer_data: PayerData,
    pub project_amount_income: AmountBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_amount_income: Option<AmountBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_amount_outcome: Option<AmountBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<SimpleItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psp_fee: Option<FeeBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_system_fee: Option<FeeBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_fee: Option<FeeBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_fee: Option<FeeBucket>,
    /// Payment requisites and transaction details, keyed by their display label
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub payment_requisites: BTreeMap<String, String>,
    pub fixed_package: Option<FixedPackageSnapshot>,
    pub status: StatusView,
    pub vat_amount: Amount,
    pub created_at: DateTime<Utc>,
    /// When the payment system confirmed the payment
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the project was last notified about the payment
    pub closed_at: Option<DateTime<Utc>>,
}

fn labelled_requisites(order: &Order) -> BTreeMap<String, String> {
    let requisites = order
        .payment_requisites
        .iter()
        .filter_map(|(k, v)| k.parse::<TxnParamKey>().ok().map(|key| (key.label().to_string(), v.clone())));
    let txn = order.payment_method_txn_params.known.iter().map(|(k, v)| (k.label().to_string(), v.clone()));
    requisites.chain(txn).collect()
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        let payment_method_amount_income = match (&o.payment_method_income_currency, o.payment_method_income_amount) {
            (Some(currency), amount) if !amount.is_zero() => Some(AmountBlock { amount, currency: currency.clone() }),
            _ => None,
        };
        let project_amount_outcome = (!o.amount_out_merchant_accounting_currency.is_zero()).then(|| AmountBlock {
            amount: o.amount_out_merchant_accounting_currency,
            currency: o.project.merchant.accounting_currency.clone(),
        });
        let selected = o.payment_method.is_some();
        let fee = |bucket: &Option<FeeBucket>| if selected { bucket.clone() } else { None };
        Self {
            id: o.id.clone(),
            project: SimpleItem { id: o.project.id.to_string(), name: o.project.name.clone() },
            account: o.project_account.clone(),
            project_order_id: o.project_order_id.clone(),
            payer_data: o.payer_data.clone(),
            project_amount_income: AmountBlock {
                amount: o.project_income_amount,
                currency: o.project_income_currency.clone(),
            },
            payment_method_amount_income,
            project_amount_outcome,
            payment_method: o.payment_method.as_ref().map(|pm| SimpleItem { id: pm.id.to_string(), name: pm.name.clone() }),
            psp_fee: fee(&o.psp_fee),
            payment_system_fee: fee(&o.payment_system_fee),
            project_fee: fee(&o.project_fee),
            payer_fee: fee(&o.payer_fee),
            payment_requisites: if selected { labelled_requisites(o) } else { BTreeMap::new() },
            fixed_package: o.fixed_package.clone(),
            status: o.status.into(),
            vat_amount: o.vat_amount,
            created_at: o.created_at,
            confirmed_at: o.payment_method_order_closed_at,
            closed_at: o.project_last_requested_at,
        }
    }
}
