//! Persisted data types for the order-processing engine.
//!
//! The central type is [`Order`], the aggregate that is created by the intake pipeline and subsequently mutated only by
//! the payment-creation and notification flows. Orders carry denormalised snapshots of the project, payment method and
//! fixed package they were created against, so that later catalog changes never alter an existing order.
use std::{
    collections::BTreeMap,
    fmt::Display,
    net::IpAddr,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use log::error;
use psp_common::{Amount, Secret};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog_types::{Merchant, PaymentMethodParams, PaymentSystem};

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(ProjectId, "Identifier of a merchant project");
string_id!(MerchantId, "Identifier of a merchant");
string_id!(PaymentMethodId, "Identifier of a payment method");
string_id!(PaymentSystemId, "Identifier of a payment system");
string_id!(FixedPackageId, "Identifier of a fixed package");

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The immutable identity of an order. Generated once, at creation, as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `s` has the exact shape of a generated order id.
    pub fn is_canonical(s: &str) -> bool {
        s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The settlement status of an order.
///
/// ```text
///  New ──create ok──► PaymentSystemCreate ──notify──► Complete | PaymentSystemDeclined | PaymentSystemCanceled
///   └──create fail──► PaymentSystemRejectOnCreate ──notify──┘
/// ```
/// Statuses only ever move forward; see [`OrderStatusType::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum OrderStatusType {
    /// The order has been created and priced, but no payment has been requested from a payment system yet.
    New,
    /// The payment system accepted the payment creation request.
    PaymentSystemCreate,
    /// The payment system refused to create the payment.
    PaymentSystemRejectOnCreate,
    /// The payment system declined the payment.
    PaymentSystemDeclined,
    /// The payment system cancelled the payment.
    PaymentSystemCanceled,
    /// The payment was completed successfully.
    Complete,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [
        Self::New,
        Self::PaymentSystemCreate,
        Self::PaymentSystemRejectOnCreate,
        Self::PaymentSystemDeclined,
        Self::PaymentSystemCanceled,
        Self::Complete,
    ];

    /// The numeric code used in storage, filters and integration events.
    pub fn code(&self) -> i32 {
        match self {
            Self::New => 0,
            Self::PaymentSystemCreate => 1,
            Self::PaymentSystemRejectOnCreate => 2,
            Self::PaymentSystemDeclined => 3,
            Self::PaymentSystemCanceled => 4,
            Self::Complete => 10,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::PaymentSystemCreate => "PaymentSystemCreate",
            Self::PaymentSystemRejectOnCreate => "PaymentSystemRejectOnCreate",
            Self::PaymentSystemDeclined => "PaymentSystemDeclined",
            Self::PaymentSystemCanceled => "PaymentSystemCanceled",
            Self::Complete => "Complete",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::New => "Order created",
            Self::PaymentSystemCreate => "Payment created in the payment system",
            Self::PaymentSystemRejectOnCreate => "Payment system rejected the payment on creation",
            Self::PaymentSystemDeclined => "Payment declined by the payment system",
            Self::PaymentSystemCanceled => "Payment canceled by the payment system",
            Self::Complete => "Order successfully complete. Notification successfully send to project",
        }
    }

    /// Terminal statuses admit no further transitions, recomputation or publication.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::PaymentSystemDeclined | Self::PaymentSystemCanceled)
    }

    /// The forward-only transition table.
    ///
    /// | From \ To                    | Create | RejectOnCreate | Declined | Canceled | Complete |
    /// |------------------------------|--------|----------------|----------|----------|----------|
    /// | New                          | ✓      | ✓              |          |          |          |
    /// | PaymentSystemCreate          |        |                | ✓        | ✓        | ✓        |
    /// | PaymentSystemRejectOnCreate  |        |                | ✓        | ✓        | ✓        |
    /// | terminal statuses            |        |                |          |          |          |
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match self {
            New => matches!(next, PaymentSystemCreate | PaymentSystemRejectOnCreate),
            PaymentSystemCreate | PaymentSystemRejectOnCreate => next.is_terminal(),
            _ => false,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.name() == s).ok_or_else(|| ConversionError(s.to_string()))
    }
}

impl From<OrderStatusType> for i32 {
    fn from(value: OrderStatusType) -> Self {
        value.code()
    }
}

impl TryFrom<i32> for OrderStatusType {
    type Error = ConversionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or_else(|| {
            error!("Unknown order status code {value} encountered");
            ConversionError(value.to_string())
        })
    }
}

//--------------------------------------      FeeBucket        ---------------------------------------------------------
/// A fee, in the payment-method currency that produced it, plus its conversions into accounting currencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBucket {
    pub amount_payment_method_currency: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_merchant_currency: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_psp_currency: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_payment_system_currency: Option<Amount>,
}

impl FeeBucket {
    pub fn new(amount_payment_method_currency: Amount) -> Self {
        Self { amount_payment_method_currency, ..Default::default() }
    }

    pub fn with_merchant_amount(mut self, amount: Amount) -> Self {
        self.amount_merchant_currency = Some(amount);
        self
    }

    pub fn with_psp_amount(mut self, amount: Amount) -> Self {
        self.amount_psp_currency = Some(amount);
        self
    }

    pub fn with_payment_system_amount(mut self, amount: Amount) -> Self {
        self.amount_payment_system_currency = Some(amount);
        self
    }

    pub fn merchant_amount(&self) -> Amount {
        self.amount_merchant_currency.unwrap_or_default()
    }
}

//--------------------------------------      PayerData        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerData {
    pub ip: Option<IpAddr>,
    /// ISO-3166-1 alpha-2 country code
    pub country: Option<String>,
    pub city: Option<String>,
    pub subdivision: Option<String>,
    pub timezone: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

//--------------------------------------      Snapshots        ---------------------------------------------------------
/// The project as it was when the order was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub name: String,
    pub merchant: Merchant,
    pub secret_key: Secret<String>,
    pub callback_protocol: String,
    pub callback_currency: String,
    pub url_success: Option<String>,
    pub url_fail: Option<String>,
    pub url_check_account: Option<String>,
    pub url_process_payment: Option<String>,
    pub send_notify_email: bool,
    pub notify_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodSnapshot {
    pub id: PaymentMethodId,
    pub name: String,
    pub group_alias: String,
    pub currency: String,
    pub params: PaymentMethodParams,
    pub payment_system: PaymentSystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPackageSnapshot {
    pub id: FixedPackageId,
    pub name: String,
    pub region: String,
    pub price: Amount,
    pub currency: String,
}

//--------------------------------------   Passthrough params   --------------------------------------------------------
/// Maximum number of entries a [`PrimitiveMap`] accepts.
pub const MAX_PRIMITIVE_ENTRIES: usize = 64;

/// A scalar value passed through from a merchant or a payment system.
///
/// Fractional numbers are held as decimals and written as JSON numbers. `Text` is tried before `Number` when reading,
/// so numeric-looking strings stay strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Number(#[serde(with = "rust_decimal::serde::float")] Decimal),
}

impl Display for PrimitiveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveValue::Bool(v) => write!(f, "{v}"),
            PrimitiveValue::Int(v) => write!(f, "{v}"),
            PrimitiveValue::Text(v) => f.write_str(v),
            PrimitiveValue::Number(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("Parameter {0} is not a primitive value")]
    NotPrimitive(String),
    #[error("No more than {MAX_PRIMITIVE_ENTRIES} passthrough parameters are accepted")]
    TooManyEntries,
    #[error("Parameter {0} is not a number that can be stored exactly")]
    NumberOutOfRange(String),
}

/// A bounded map of primitive values. Nested structures are rejected at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimitiveMap(BTreeMap<String, PrimitiveValue>);

impl PrimitiveMap {
    pub fn insert(&mut self, key: String, value: PrimitiveValue) -> Result<(), ParamError> {
        if !self.0.contains_key(&key) && self.0.len() >= MAX_PRIMITIVE_ENTRIES {
            return Err(ParamError::TooManyEntries);
        }
        self.0.insert(key, value);
        Ok(())
    }

    /// Converts a JSON value into a primitive and stores it. `null` values are ignored.
    pub fn insert_json(&mut self, key: &str, value: &serde_json::Value) -> Result<(), ParamError> {
        use serde_json::Value;
        let primitive = match value {
            Value::Null => return Ok(()),
            Value::Bool(b) => PrimitiveValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PrimitiveValue::Int(i),
                None => {
                    let d = Decimal::from_str(&n.to_string()).map_err(|_| ParamError::NumberOutOfRange(key.to_string()))?;
                    PrimitiveValue::Number(d)
                },
            },
            Value::String(s) => PrimitiveValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => return Err(ParamError::NotPrimitive(key.to_string())),
        };
        self.insert(key.to_string(), primitive)
    }

    pub fn get(&self, key: &str) -> Option<&PrimitiveValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PrimitiveValue)> {
        self.0.iter()
    }

    /// All values rendered as strings, for cross-service payloads.
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.0.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
    }
}

/// Well-known transaction parameters reported by payment systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnParamKey {
    Pan,
    CardHolder,
    CardBrand,
    CardType,
    IssuerName,
    IssuerCountry,
    PayerAccount,
    AuthCode,
    Rrn,
}

impl TxnParamKey {
    /// Human-readable label used when presenting payment requisites.
    pub fn label(&self) -> &'static str {
        match self {
            TxnParamKey::Pan => "Card number",
            TxnParamKey::CardHolder => "Card holder",
            TxnParamKey::CardBrand => "Card brand",
            TxnParamKey::CardType => "Card type",
            TxnParamKey::IssuerName => "Issuer",
            TxnParamKey::IssuerCountry => "Issuer country",
            TxnParamKey::PayerAccount => "Payer account",
            TxnParamKey::AuthCode => "Authorization code",
            TxnParamKey::Rrn => "Retrieval reference number",
        }
    }
}

impl FromStr for TxnParamKey {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| ConversionError(format!("Unknown transaction parameter: {s}")))
    }
}

/// Payment-system transaction parameters: typed well-known keys plus a bounded map of anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnParams {
    #[serde(default)]
    pub known: BTreeMap<TxnParamKey, String>,
    #[serde(default)]
    pub additional: PrimitiveMap,
}

impl TxnParams {
    pub fn with(mut self, key: TxnParamKey, value: impl Into<String>) -> Self {
        self.known.insert(key, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.additional.is_empty()
    }

    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        let mut result = self.additional.to_string_map();
        for (k, v) in &self.known {
            if let Ok(serde_json::Value::String(key)) = serde_json::to_value(k) {
                result.insert(key, v.clone());
            }
        }
        result
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
/// The persisted order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Incremented by the repository on every successful update.
    pub version: i64,
    pub project: ProjectSnapshot,
    pub project_order_id: Option<String>,
    pub project_account: String,
    pub description: String,
    pub project_income_amount: Amount,
    pub project_income_currency: String,
    pub project_outcome_amount: Amount,
    pub project_outcome_currency: String,
    pub project_params: PrimitiveMap,
    pub payer_data: PayerData,
    pub payment_method: Option<PaymentMethodSnapshot>,
    pub payment_method_terminal_id: Option<String>,
    pub payment_method_order_id: Option<String>,
    pub payment_method_payer_account: Option<String>,
    pub payment_method_outcome_amount: Amount,
    pub payment_method_outcome_currency: Option<String>,
    pub payment_method_income_amount: Amount,
    pub payment_method_income_currency: Option<String>,
    pub payment_method_order_closed_at: Option<DateTime<Utc>>,
    pub payment_method_txn_params: TxnParams,
    pub payment_requisites: BTreeMap<String, String>,
    pub fixed_package: Option<FixedPackageSnapshot>,
    pub vat_amount: Amount,
    pub project_fee: Option<FeeBucket>,
    pub psp_fee: Option<FeeBucket>,
    pub payment_system_fee: Option<FeeBucket>,
    pub payer_fee: Option<FeeBucket>,
    pub amount_in_psp_accounting_currency: Amount,
    pub amount_in_merchant_accounting_currency: Amount,
    pub amount_out_merchant_accounting_currency: Amount,
    pub amount_in_payment_system_accounting_currency: Amount,
    pub url_success: Option<String>,
    pub url_fail: Option<String>,
    pub url_verify: Option<String>,
    pub url_notify: Option<String>,
    pub is_json_request: bool,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub project_last_requested_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn merchant_id(&self) -> &MerchantId {
        &self.project.merchant.id
    }

    pub fn payment_handler_name(&self) -> Option<&str> {
        self.payment_method.as_ref().map(|pm| pm.params.handler.as_str())
    }
}
