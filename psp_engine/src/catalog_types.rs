//! Reference data owned by external services and read by the engine: merchants, projects, currencies, payment methods,
//! payment systems and fixed packages.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use psp_common::{Amount, Secret};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    FixedPackageId,
    MerchantId,
    PaymentMethodId,
    PaymentSystemId,
    ProjectId,
    ProjectSnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code_int: i32,
    /// ISO-4217 alphabetic code
    pub code_a3: String,
    pub name: String,
    pub is_active: bool,
}

impl Currency {
    pub fn new(code_int: i32, code_a3: &str, name: &str) -> Self {
        Self { code_int, code_a3: code_a3.to_string(), name: name.to_string(), is_active: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    /// The currency the merchant settles in
    pub accounting_currency: String,
    pub is_vat_enabled: bool,
    /// If true, part of the commission is shifted onto the payer
    pub is_commission_to_user_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodParams {
    /// Name of the payment-system handler that processes this method
    pub handler: String,
    pub terminal: String,
    pub external_id: String,
    #[serde(default)]
    pub other: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSystem {
    pub id: PaymentSystemId,
    pub name: String,
    /// ISO-3166-1 alpha-2 country code
    pub country: String,
    pub accounting_currency: String,
    pub accounting_period: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub group_alias: String,
    pub currency: String,
    pub min_payment_amount: Amount,
    pub max_payment_amount: Amount,
    pub is_active: bool,
    pub params: PaymentMethodParams,
    pub payment_system: Option<PaymentSystem>,
}

/// Links a project to a payment method. A project may carry several mappings for the same alias; the most recently
/// added one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaymentMethod {
    pub id: PaymentMethodId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPackage {
    pub id: FixedPackageId,
    pub name: String,
    pub region: String,
    pub price: Amount,
    pub currency: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub merchant: Merchant,
    pub name: String,
    pub is_active: bool,
    pub secret_key: Secret<String>,
    pub callback_protocol: String,
    /// Currency in which the project is notified about payments
    pub callback_currency: String,
    /// Currency in which `min_payment_amount` and `max_payment_amount` are expressed
    pub limits_currency: String,
    pub min_payment_amount: Amount,
    pub max_payment_amount: Amount,
    pub is_allow_dynamic_notify_urls: bool,
    pub is_allow_dynamic_redirect_urls: bool,
    pub url_redirect_success: Option<String>,
    pub url_redirect_fail: Option<String>,
    pub url_check_account: Option<String>,
    pub url_process_payment: Option<String>,
    pub send_notify_email: bool,
    pub notify_emails: Vec<String>,
    /// Payment method mappings, keyed by the alias a request uses to select them
    pub payment_methods: BTreeMap<String, Vec<ProjectPaymentMethod>>,
    /// Fixed packages, keyed by region
    pub fixed_packages: BTreeMap<String, Vec<FixedPackage>>,
}

impl Project {
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            merchant: self.merchant.clone(),
            secret_key: self.secret_key.clone(),
            callback_protocol: self.callback_protocol.clone(),
            callback_currency: self.callback_currency.clone(),
            url_success: self.url_redirect_success.clone(),
            url_fail: self.url_redirect_fail.clone(),
            url_check_account: self.url_check_account.clone(),
            url_process_payment: self.url_process_payment.clone(),
            send_notify_email: self.send_notify_email,
            notify_emails: self.notify_emails.clone(),
        }
    }

    pub fn has_fixed_packages(&self) -> bool {
        self.fixed_packages.values().any(|p| !p.is_empty())
    }

    /// The most recently added payment method mapping for `alias`, if any.
    pub fn payment_method_mapping(&self, alias: &str) -> Option<&ProjectPaymentMethod> {
        self.payment_methods.get(alias)?.iter().max_by_key(|m| m.added_at)
    }
}
