use std::{collections::BTreeMap, fmt::Display, net::IpAddr};

use psp_common::Amount;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, PaymentMethodId, ProjectId},
    helpers::SIGNATURE_FIELD,
};

// Reserved request fields. Merchants may not use these names for passthrough parameters.
pub const FIELD_PROJECT_ID: &str = "PP_PROJECT_ID";
pub const FIELD_SIGNATURE: &str = SIGNATURE_FIELD;
pub const FIELD_AMOUNT: &str = "PP_AMOUNT";
pub const FIELD_CURRENCY: &str = "PP_CURRENCY";
pub const FIELD_ACCOUNT: &str = "PP_ACCOUNT";
pub const FIELD_ORDER_ID: &str = "PP_ORDER_ID";
pub const FIELD_PAYMENT_METHOD: &str = "PP_PAYMENT_METHOD";
pub const FIELD_URL_VERIFY: &str = "PP_URL_VERIFY";
pub const FIELD_URL_NOTIFY: &str = "PP_URL_NOTIFY";
pub const FIELD_URL_SUCCESS: &str = "PP_URL_SUCCESS";
pub const FIELD_URL_FAIL: &str = "PP_URL_FAIL";
pub const FIELD_PAYER_EMAIL: &str = "PP_PAYER_EMAIL";
pub const FIELD_PAYER_PHONE: &str = "PP_PAYER_PHONE";
pub const FIELD_DESCRIPTION: &str = "PP_DESCRIPTION";
pub const FIELD_REGION: &str = "PP_REGION";

const RESERVED_PREFIX: &str = "PP_";

/// True for field names the engine interprets itself.
pub fn is_reserved_field(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// A raw order request from a merchant project, as received by the transport layer.
///
/// It is consumed exactly once, by [`crate::OrderFlowApi::process_new_order`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderScalar {
    pub project_id: ProjectId,
    pub amount: Amount,
    /// ISO-4217 alphabetic code. Defaults to the project's limits currency.
    pub currency: Option<String>,
    pub account: String,
    /// The merchant's own order id. Must be unique per project.
    pub order_id: Option<String>,
    pub description: Option<String>,
    /// Payment method alias, as configured on the project
    pub payment_method: Option<String>,
    pub url_verify: Option<String>,
    pub url_notify: Option<String>,
    pub url_success: Option<String>,
    pub url_fail: Option<String>,
    pub payer_email: Option<String>,
    pub payer_phone: Option<String>,
    /// ISO-3166-1 alpha-2 code of the payer's region
    pub region: Option<String>,
    pub payer_ip: Option<IpAddr>,
    /// Hex-encoded request signature
    pub signature: Option<String>,
    /// Every field of the request exactly as submitted, used to verify the signature.
    #[serde(default)]
    pub raw_params: BTreeMap<String, String>,
    /// Non-reserved fields, passed through to the order.
    #[serde(default)]
    pub other: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub is_json_request: bool,
}

impl OrderScalar {
    pub fn new<P: Into<ProjectId>>(project_id: P, amount: Amount, account: &str) -> Self {
        Self { project_id: project_id.into(), amount, account: account.to_string(), ..Default::default() }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn with_order_id(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_payment_method(mut self, alias: &str) -> Self {
        self.payment_method = Some(alias.to_string());
        self
    }

    pub fn with_notify_urls(mut self, verify: Option<&str>, notify: Option<&str>) -> Self {
        self.url_verify = verify.map(String::from);
        self.url_notify = notify.map(String::from);
        self
    }

    pub fn with_redirect_urls(mut self, success: Option<&str>, fail: Option<&str>) -> Self {
        self.url_success = success.map(String::from);
        self.url_fail = fail.map(String::from);
        self
    }

    pub fn with_payer_email(mut self, email: &str) -> Self {
        self.payer_email = Some(email.to_string());
        self
    }

    pub fn with_payer_phone(mut self, phone: &str) -> Self {
        self.payer_phone = Some(phone.to_string());
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_payer_ip(mut self, ip: IpAddr) -> Self {
        self.payer_ip = Some(ip);
        self
    }

    pub fn with_passthrough(mut self, key: &str, value: serde_json::Value) -> Self {
        self.other.insert(key.to_string(), value);
        self
    }

    /// Attaches the raw request fields and the signature that was submitted with them.
    pub fn with_signed_params(mut self, raw_params: BTreeMap<String, String>, signature: &str) -> Self {
        self.raw_params = raw_params;
        self.signature = Some(signature.to_string());
        self
    }

    pub fn as_json_request(mut self) -> Self {
        self.is_json_request = true;
        self
    }
}

impl Display for OrderScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let currency = self.currency.as_deref().unwrap_or("(default currency)");
        write!(f, "project {} / account {} / {} {currency}", self.project_id, self.account, self.amount)?;
        if let Some(id) = &self.order_id {
            write!(f, " / order {id}")?;
        }
        Ok(())
    }
}

/// A notification from a payment system about an order. The payload is opaque to the engine and is interpreted by
/// the order's payment-system handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaymentNotification {
    pub order_id: OrderId,
    pub payload: serde_json::Value,
}

impl OrderPaymentNotification {
    pub fn new(order_id: OrderId, payload: serde_json::Value) -> Self {
        Self { order_id, payload }
    }
}

/// A payer's request to pay an existing order with a given payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
    pub payment_method_id: PaymentMethodId,
    pub email: Option<String>,
    /// Payment requisites entered by the payer (card data, wallet number, ...). Passed to the handler as-is.
    #[serde(default)]
    pub requisites: BTreeMap<String, String>,
}

impl CreatePaymentRequest {
    pub fn new(order_id: OrderId, payment_method_id: PaymentMethodId) -> Self {
        Self { order_id, payment_method_id, email: None, requisites: BTreeMap::new() }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_requisite(mut self, key: &str, value: &str) -> Self {
        self.requisites.insert(key.to_string(), value.to_string());
        self
    }
}

/// The result of processing a payment-system notification.
///
/// `AlreadyProcessed` outcomes are successful but made no change, because the order had already been settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The handler's response, after the order was stored (and, for final results, published).
    Handled(crate::traits::PaymentResponse),
    /// The order had already been settled. Carries the explanatory message.
    AlreadyProcessed { order: Order, message: String },
}

impl NotifyOutcome {
    pub fn message(&self) -> &str {
        match self {
            NotifyOutcome::Handled(r) => &r.message,
            NotifyOutcome::AlreadyProcessed { message, .. } => message,
        }
    }
}
