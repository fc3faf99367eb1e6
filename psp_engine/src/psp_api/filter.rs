//! Storage-agnostic order filters.
//!
//! A caller's query arrives as a generic [`QueryEnvelope`] of key → values. [`build_predicate`] turns it into a
//! [`Predicate`] tree that storage backends either evaluate directly ([`Predicate::matches`]) or translate into their
//! own query language.
//!
//! There are two mutually exclusive modes:
//! * **quick filter**: if the `quick_filter` key is present, every other filter key is ignored and the text is
//!   matched, case-insensitively, against the project name, project account, the project's order id, the fixed
//!   package name, the payment method name and the order id.
//! * **structured filter**: otherwise, each recognised key adds one clause, and all clauses must hold.
//!
//! Both modes are always scoped to the caller's accessible projects.
use std::{cmp::Ordering, collections::BTreeMap, fmt::Display};

use chrono::{DateTime, TimeZone, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, ProjectId};

pub const KEY_QUICK_FILTER: &str = "quick_filter";
pub const KEY_ID: &str = "id";
pub const KEY_PAYMENT_METHODS: &str = "payment_methods";
pub const KEY_COUNTRIES: &str = "countries";
pub const KEY_STATUSES: &str = "statuses";
pub const KEY_ACCOUNT: &str = "account";
pub const KEY_PM_DATE_FROM: &str = "pm_date_from";
pub const KEY_PM_DATE_TO: &str = "pm_date_to";
pub const KEY_PROJECT_DATE_FROM: &str = "project_date_from";
pub const KEY_PROJECT_DATE_TO: &str = "project_date_to";

pub const DEFAULT_PAGE_LIMIT: u64 = 100;

//--------------------------------------    QueryEnvelope     ---------------------------------------------------------
/// A generic multi-valued query, e.g. decoded from a URL query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryEnvelope(BTreeMap<String, Vec<String>>);

impl QueryEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the values for `key`.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.entry(key.to_string()).or_default().push(value.to_string());
        self
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn all(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn is_quick_filter(&self) -> bool {
        self.0.contains_key(KEY_QUICK_FILTER)
    }
}

impl From<BTreeMap<String, Vec<String>>> for QueryEnvelope {
    fn from(values: BTreeMap<String, Vec<String>>) -> Self {
        Self(values)
    }
}

//--------------------------------------      Predicate       ---------------------------------------------------------
/// The order attributes a predicate can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    Id,
    ProjectId,
    ProjectName,
    ProjectAccount,
    ProjectOrderId,
    FixedPackageName,
    PaymentMethodId,
    PaymentMethodName,
    PaymentMethodPayerAccount,
    PayerCountry,
    PayerPhone,
    PayerEmail,
    Status,
    CreatedAt,
    PaymentMethodClosedAt,
}

impl OrderField {
    pub fn value_of(&self, order: &Order) -> FilterValue {
        use FilterValue::{Null, Text};
        let text = |s: Option<&str>| s.map(|s| Text(s.to_string())).unwrap_or(Null);
        let pm = order.payment_method.as_ref();
        match self {
            OrderField::Id => Text(order.id.to_string()),
            OrderField::ProjectId => Text(order.project.id.to_string()),
            OrderField::ProjectName => Text(order.project.name.clone()),
            OrderField::ProjectAccount => Text(order.project_account.clone()),
            OrderField::ProjectOrderId => text(order.project_order_id.as_deref()),
            OrderField::FixedPackageName => text(order.fixed_package.as_ref().map(|p| p.name.as_str())),
            OrderField::PaymentMethodId => text(pm.map(|pm| pm.id.as_str())),
            OrderField::PaymentMethodName => text(pm.map(|pm| pm.name.as_str())),
            OrderField::PaymentMethodPayerAccount => text(order.payment_method_payer_account.as_deref()),
            OrderField::PayerCountry => text(order.payer_data.country.as_deref()),
            OrderField::PayerPhone => text(order.payer_data.phone.as_deref()),
            OrderField::PayerEmail => text(order.payer_data.email.as_deref()),
            OrderField::Status => FilterValue::Int(i64::from(order.status.code())),
            OrderField::CreatedAt => FilterValue::Time(order.created_at),
            OrderField::PaymentMethodClosedAt => {
                order.payment_method_order_closed_at.map(FilterValue::Time).unwrap_or(Null)
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// The attribute is absent. Absent attributes match no clause.
    Null,
    Text(String),
    Int(i64),
    Time(DateTime<Utc>),
}

impl FilterValue {
    pub fn text<S: Into<String>>(s: S) -> Self {
        FilterValue::Text(s.into())
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Int(a), FilterValue::Int(b)) => Some(a.cmp(b)),
            (FilterValue::Time(a), FilterValue::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Null => f.write_str("null"),
            FilterValue::Text(s) => write!(f, "'{s}'"),
            FilterValue::Int(i) => write!(f, "{i}"),
            FilterValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// The case folding used for case-insensitive matching. Backends that match in their own query language store and
/// compare text folded with this function.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// A storage-agnostic boolean condition over orders.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(OrderField, FilterValue),
    /// Set membership. An empty set matches nothing.
    In(OrderField, Vec<FilterValue>),
    /// Inclusive range. A missing bound is open.
    Range { field: OrderField, from: Option<FilterValue>, to: Option<FilterValue> },
    /// Substring match after both sides are folded with [`fold_case`]. `pattern` is literal text, not a regular
    /// expression.
    Regex { field: OrderField, pattern: String },
    Or(Vec<Predicate>),
    /// All clauses must hold. An empty conjunction matches everything.
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn contains(field: OrderField, pattern: &str) -> Self {
        Predicate::Regex { field, pattern: pattern.to_string() }
    }

    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Predicate::Equals(field, value) => field.value_of(order) == *value,
            Predicate::In(field, values) => {
                let v = field.value_of(order);
                v != FilterValue::Null && values.contains(&v)
            },
            Predicate::Range { field, from, to } => {
                let v = field.value_of(order);
                if v == FilterValue::Null {
                    return false;
                }
                let above = from.as_ref().map(|f| matches!(v.compare(f), Some(Ordering::Greater | Ordering::Equal)));
                let below = to.as_ref().map(|t| matches!(v.compare(t), Some(Ordering::Less | Ordering::Equal)));
                above.unwrap_or(true) && below.unwrap_or(true)
            },
            Predicate::Regex { field, pattern } => {
                let value = field.value_of(order);
                value.as_text().is_some_and(|text| fold_case(text).contains(&fold_case(pattern)))
            },
            Predicate::Or(clauses) => clauses.iter().any(|p| p.matches(order)),
            Predicate::And(clauses) => clauses.iter().all(|p| p.matches(order)),
        }
    }
}

fn parse_unix_seconds(value: Option<&str>) -> Option<FilterValue> {
    let value = value?;
    match value.trim().parse::<i64>().ok().and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
        Some(t) => Some(FilterValue::Time(t)),
        None => {
            debug!("🔎️ Ignoring invalid timestamp '{value}' in order filter");
            None
        },
    }
}

fn date_range(envelope: &QueryEnvelope, field: OrderField, from_key: &str, to_key: &str) -> Option<Predicate> {
    let from = parse_unix_seconds(envelope.first(from_key));
    let to = parse_unix_seconds(envelope.first(to_key));
    (from.is_some() || to.is_some()).then_some(Predicate::Range { field, from, to })
}

fn quick_filter(text: &str) -> Predicate {
    Predicate::Or(
        [
            OrderField::ProjectName,
            OrderField::ProjectAccount,
            OrderField::ProjectOrderId,
            OrderField::FixedPackageName,
            OrderField::PaymentMethodName,
            OrderField::Id,
        ]
        .into_iter()
        .map(|field| Predicate::contains(field, text))
        .collect(),
    )
}

fn structured_filter(envelope: &QueryEnvelope) -> Vec<Predicate> {
    let mut clauses = Vec::new();
    if let Some(id) = envelope.first(KEY_ID) {
        if OrderId::is_canonical(id) {
            clauses.push(Predicate::Equals(OrderField::Id, FilterValue::text(id)));
        } else {
            clauses.push(Predicate::contains(OrderField::Id, id));
        }
    }
    if let Some(pms) = envelope.all(KEY_PAYMENT_METHODS) {
        let values = pms.iter().map(|s| FilterValue::text(s.as_str())).collect();
        clauses.push(Predicate::In(OrderField::PaymentMethodId, values));
    }
    if let Some(countries) = envelope.all(KEY_COUNTRIES) {
        let values = countries.iter().map(|s| FilterValue::text(s.as_str())).collect();
        clauses.push(Predicate::In(OrderField::PayerCountry, values));
    }
    if let Some(statuses) = envelope.all(KEY_STATUSES) {
        let codes = statuses.iter().filter_map(|s| s.trim().parse::<i64>().ok()).map(FilterValue::Int).collect::<Vec<_>>();
        if !codes.is_empty() {
            clauses.push(Predicate::In(OrderField::Status, codes));
        }
    }
    if let Some(account) = envelope.first(KEY_ACCOUNT) {
        clauses.push(Predicate::Or(
            [OrderField::ProjectAccount, OrderField::PaymentMethodPayerAccount, OrderField::PayerPhone, OrderField::PayerEmail]
                .into_iter()
                .map(|field| Predicate::contains(field, account))
                .collect(),
        ));
    }
    clauses.extend(date_range(envelope, OrderField::PaymentMethodClosedAt, KEY_PM_DATE_FROM, KEY_PM_DATE_TO));
    clauses.extend(date_range(envelope, OrderField::CreatedAt, KEY_PROJECT_DATE_FROM, KEY_PROJECT_DATE_TO));
    clauses
}

/// Builds the predicate for `envelope`, restricted to orders of the `accessible` projects.
pub fn build_predicate(envelope: &QueryEnvelope, accessible: &[ProjectId]) -> Predicate {
    let scope = Predicate::In(OrderField::ProjectId, accessible.iter().map(|p| FilterValue::text(p.as_str())).collect());
    let mut clauses = vec![scope];
    match envelope.first(KEY_QUICK_FILTER) {
        Some(text) => {
            trace!("🔎️ Quick filter for '{text}'");
            clauses.push(quick_filter(text));
        },
        None => clauses.extend(structured_filter(envelope)),
    }
    Predicate::And(clauses)
}

//--------------------------------------    Sort and paging    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Status,
    ProjectName,
    /// The project income amount
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortField {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Parses a token such as `created_at` or `-amount`. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (order, name) = match token.strip_prefix('-') {
            Some(name) => (SortOrder::Descending, name),
            None => (SortOrder::Ascending, token),
        };
        let key = match name {
            "created_at" => SortKey::CreatedAt,
            "status" => SortKey::Status,
            "project_name" => SortKey::ProjectName,
            "amount" => SortKey::Amount,
            _ => return None,
        };
        Some(Self { key, order })
    }

    fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let ord = match self.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Status => a.status.code().cmp(&b.status.code()),
            SortKey::ProjectName => a.project.name.cmp(&b.project.name),
            SortKey::Amount => a.project_income_amount.cmp(&b.project_income_amount),
        };
        match self.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// Parses sort tokens, dropping unknown ones. Defaults to newest first.
pub fn parse_sort<S: AsRef<str>>(tokens: &[S]) -> Vec<SortField> {
    let mut fields = tokens
        .iter()
        .filter_map(|t| {
            let field = SortField::parse(t.as_ref());
            if field.is_none() {
                debug!("🔎️ Ignoring unknown sort field '{}'", t.as_ref());
            }
            field
        })
        .collect::<Vec<_>>();
    if fields.is_empty() {
        fields.push(SortField::new(SortKey::CreatedAt, SortOrder::Descending));
    }
    fields
}

/// A predicate together with the ordering and window of the rows to return.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    pub predicate: Predicate,
    pub sort: Vec<SortField>,
    pub limit: u64,
    pub offset: u64,
}

impl OrderQuery {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate, sort: parse_sort::<&str>(&[]), limit: DEFAULT_PAGE_LIMIT, offset: 0 }
    }

    pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
        if !sort.is_empty() {
            self.sort = sort;
        }
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Compares two orders by the sort fields in turn, then by id so that pages are stable.
    pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
        self.sort.iter().map(|s| s.compare(a, b)).find(|o| o.is_ne()).unwrap_or_else(|| a.id.cmp(&b.id))
    }
}
