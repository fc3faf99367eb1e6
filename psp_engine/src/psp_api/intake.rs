//! Validation and enrichment of raw order requests.
//!
//! [`IntakeValidator::validate`] applies the intake rules in a fixed order and stops at the first one that is
//! violated:
//!
//! 0. the currency, region and URLs are well formed,
//! 1. the project exists and is active,
//! 2. a supplied currency is known,
//! 3. a supplied signature is valid,
//! 4. a requested payment method is configured for the project, and it and its payment system are active,
//! 5. the amount is within the project's limits,
//! 6. the amount is within the payment method's limits,
//! 7. the project has not used the client order id before,
//! 8. dynamic notify and redirect URLs are only given when the project allows them.
//!
//! After that the payer's location is resolved and, for projects that sell fixed packages, the package is selected.
use std::collections::BTreeMap;

use chrono::Utc;
use log::*;
use psp_common::Amount;

use crate::{
    catalog_types::{Currency, FixedPackage, PaymentMethod, PaymentSystem, Project},
    db_types::{FixedPackageSnapshot, Order, OrderId, OrderStatusType, PayerData, PaymentMethodSnapshot, PrimitiveMap},
    helpers::{is_currency_code, is_region_code, is_url, verify_signature},
    psp_api::{
        collaborators::Collaborators,
        errors::{OrderFlowError, ValidationError},
        order_objects::{
            is_reserved_field,
            OrderScalar,
            FIELD_CURRENCY,
            FIELD_REGION,
            FIELD_URL_FAIL,
            FIELD_URL_NOTIFY,
            FIELD_URL_SUCCESS,
            FIELD_URL_VERIFY,
        },
    },
    traits::{GeoRecord, OrderRepository},
};

const DEFAULT_DESCRIPTION_PREFIX: &str = "Payment by order # ";

/// A payment method that passed validation, together with the order amount expressed in its currency.
#[derive(Debug, Clone)]
pub struct ResolvedPaymentMethod {
    pub method: PaymentMethod,
    pub payment_system: PaymentSystem,
    pub outcome_amount: Amount,
}

impl ResolvedPaymentMethod {
    pub fn snapshot(&self) -> PaymentMethodSnapshot {
        PaymentMethodSnapshot {
            id: self.method.id.clone(),
            name: self.method.name.clone(),
            group_alias: self.method.group_alias.clone(),
            currency: self.method.currency.clone(),
            params: self.method.params.clone(),
            payment_system: self.payment_system.clone(),
        }
    }
}

/// Everything intake learned about a request that passed validation.
#[derive(Debug, Clone)]
pub struct IntakeContext {
    pub project: Project,
    pub currency: Currency,
    pub payment_method: Option<ResolvedPaymentMethod>,
    pub geo: GeoRecord,
    pub fixed_package: Option<FixedPackageSnapshot>,
    pub params: PrimitiveMap,
}

pub struct IntakeValidator<'a> {
    collaborators: &'a Collaborators,
    require_signature: bool,
}

impl<'a> IntakeValidator<'a> {
    pub fn new(collaborators: &'a Collaborators, require_signature: bool) -> Self {
        Self { collaborators, require_signature }
    }

    pub async fn validate<B: OrderRepository>(
        &self,
        db: &B,
        request: &OrderScalar,
    ) -> Result<IntakeContext, OrderFlowError> {
        // (0)
        check_field_formats(request)?;
        // (1)
        let project = self
            .collaborators
            .projects
            .fetch_project(&request.project_id)
            .await?
            .ok_or(ValidationError::ProjectNotFound)?;
        if !project.is_active {
            return Err(ValidationError::ProjectInactive.into());
        }
        // (2)
        let currency = self.resolve_currency(&project, request).await?;
        // (3)
        self.check_signature(&project, request)?;
        // (4)
        let method = match &request.payment_method {
            Some(alias) => Some(self.resolve_payment_method(&project, alias).await?),
            None => None,
        };
        // (5)
        self.check_project_limits(&project, &currency.code_a3, request.amount).await?;
        // (6)
        let payment_method = match method {
            Some((method, payment_system)) => {
                let outcome_amount =
                    self.check_payment_method_limits(&method, &currency.code_a3, request.amount).await?;
                Some(ResolvedPaymentMethod { method, payment_system, outcome_amount })
            },
            None => None,
        };
        // (7)
        if let Some(project_order_id) = request.order_id.as_deref().filter(|s| !s.is_empty()) {
            if db.fetch_order_by_project_order_id(&project.id, project_order_id).await?.is_some() {
                debug!("📥️ Project {} already submitted order {project_order_id}", project.id);
                return Err(ValidationError::DuplicateProjectOrderId.into());
            }
        }
        // (8)
        if (request.url_verify.is_some() || request.url_notify.is_some()) && !project.is_allow_dynamic_notify_urls {
            return Err(ValidationError::DynamicNotifyUrlsNotAllowed.into());
        }
        if (request.url_success.is_some() || request.url_fail.is_some()) && !project.is_allow_dynamic_redirect_urls {
            return Err(ValidationError::DynamicRedirectUrlsNotAllowed.into());
        }

        let geo = self.resolve_geo(request).await?;
        let fixed_package = if project.has_fixed_packages() {
            let region = request.region.clone().or_else(|| geo.country.clone());
            Some(select_fixed_package(&project, region.as_deref(), request.amount, &currency.code_a3)?)
        } else {
            None
        };
        let params = passthrough_params(request)?;
        trace!("📥️ Order request [{request}] passed validation");
        Ok(IntakeContext { project, currency, payment_method, geo, fixed_package, params })
    }

    async fn resolve_currency(&self, project: &Project, request: &OrderScalar) -> Result<Currency, OrderFlowError> {
        let (code, supplied) = match &request.currency {
            Some(code) => (code.trim().to_ascii_uppercase(), true),
            None => (project.limits_currency.clone(), false),
        };
        match self.collaborators.currencies.fetch_currency(&code).await? {
            Some(currency) => Ok(currency),
            None if supplied => Err(ValidationError::CurrencyNotFound.into()),
            None => {
                error!("📥️ The limits currency {code} of project {} is not in the currency catalog", project.id);
                Err(ValidationError::CurrencyNotFound.into())
            },
        }
    }

    fn check_signature(&self, project: &Project, request: &OrderScalar) -> Result<(), ValidationError> {
        match &request.signature {
            Some(signature) => {
                if verify_signature(&request.raw_params, project.secret_key.reveal(), signature) {
                    Ok(())
                } else {
                    warn!("📥️ Invalid signature on order request for project {}", project.id);
                    Err(ValidationError::SignatureInvalid)
                }
            },
            None if self.require_signature => {
                warn!("📥️ Unsigned order request for project {} rejected", project.id);
                Err(ValidationError::SignatureInvalid)
            },
            None => Ok(()),
        }
    }

    async fn resolve_payment_method(
        &self,
        project: &Project,
        alias: &str,
    ) -> Result<(PaymentMethod, PaymentSystem), OrderFlowError> {
        let mapping = project.payment_method_mapping(alias).ok_or(ValidationError::PaymentMethodNotAllowed)?;
        let method = self
            .collaborators
            .payment_methods
            .fetch_payment_method(&mapping.id)
            .await?
            .ok_or(ValidationError::PaymentMethodNotFound)?;
        validate_payment_method(method).map_err(OrderFlowError::from)
    }

    async fn check_project_limits(
        &self,
        project: &Project,
        currency: &str,
        amount: Amount,
    ) -> Result<(), OrderFlowError> {
        let amount = self.collaborators.rates.convert(currency, &project.limits_currency, amount).await?;
        if amount < project.min_payment_amount {
            return Err(ValidationError::AmountBelowProjectMinimum.into());
        }
        if amount > project.max_payment_amount {
            return Err(ValidationError::AmountAboveProjectMaximum.into());
        }
        Ok(())
    }

    /// Checks the payment method's limits and returns the amount in the payment method's currency.
    pub async fn check_payment_method_limits(
        &self,
        method: &PaymentMethod,
        currency: &str,
        amount: Amount,
    ) -> Result<Amount, OrderFlowError> {
        let amount = self.collaborators.rates.convert(currency, &method.currency, amount).await?;
        if amount < method.min_payment_amount {
            return Err(ValidationError::AmountBelowPaymentMethodMinimum.into());
        }
        if amount > method.max_payment_amount {
            return Err(ValidationError::AmountAbovePaymentMethodMaximum.into());
        }
        Ok(amount)
    }

    async fn resolve_geo(&self, request: &OrderScalar) -> Result<GeoRecord, ValidationError> {
        let Some(ip) = request.payer_ip else {
            return Ok(GeoRecord::default());
        };
        self.collaborators.geo.resolve(ip).await.map_err(|e| {
            warn!("📥️ Could not resolve the location of payer {ip}. {e}");
            ValidationError::PayerRegionUnknown
        })
    }

    /// Builds the new order from a validated request. Amounts in other currencies are converted here.
    pub async fn build_order(&self, ctx: IntakeContext, request: &OrderScalar) -> Result<Order, OrderFlowError> {
        let IntakeContext { project, currency, payment_method, geo, fixed_package, params } = ctx;
        let rates = &self.collaborators.rates;
        let amount = request.amount;
        let amount_in_merchant =
            rates.convert(&currency.code_a3, &project.merchant.accounting_currency, amount).await?;
        let outcome_amount = rates.convert(&currency.code_a3, &project.callback_currency, amount).await?;
        let id = OrderId::generate();
        let now = Utc::now();
        let payer_data = PayerData {
            ip: request.payer_ip,
            country: geo.country.or_else(|| request.region.clone()),
            city: geo.city,
            subdivision: geo.subdivision,
            timezone: geo.timezone,
            email: request.payer_email.clone(),
            phone: request.payer_phone.clone(),
        };
        let (pm_snapshot, pm_amount, pm_currency) = match &payment_method {
            Some(pm) => (Some(pm.snapshot()), pm.outcome_amount, Some(pm.method.currency.clone())),
            None => (None, Amount::zero(), None),
        };
        let description = request.description.clone().unwrap_or_else(|| format!("{DEFAULT_DESCRIPTION_PREFIX}{id}"));
        Ok(Order {
            id,
            version: 0,
            project_order_id: request.order_id.clone().filter(|s| !s.is_empty()),
            project_account: request.account.clone(),
            description,
            project_income_amount: amount,
            project_income_currency: currency.code_a3.clone(),
            project_outcome_amount: outcome_amount,
            project_outcome_currency: project.callback_currency.clone(),
            project_params: params,
            payer_data,
            payment_method: pm_snapshot,
            payment_method_terminal_id: None,
            payment_method_order_id: None,
            payment_method_payer_account: None,
            payment_method_outcome_amount: pm_amount,
            payment_method_outcome_currency: pm_currency,
            payment_method_income_amount: Amount::zero(),
            payment_method_income_currency: None,
            payment_method_order_closed_at: None,
            payment_method_txn_params: Default::default(),
            payment_requisites: BTreeMap::new(),
            fixed_package,
            vat_amount: Amount::zero(),
            project_fee: None,
            psp_fee: None,
            payment_system_fee: None,
            payer_fee: None,
            amount_in_psp_accounting_currency: Amount::zero(),
            amount_in_merchant_accounting_currency: amount_in_merchant,
            amount_out_merchant_accounting_currency: Amount::zero(),
            amount_in_payment_system_accounting_currency: Amount::zero(),
            url_success: request.url_success.clone(),
            url_fail: request.url_fail.clone(),
            url_verify: request.url_verify.clone(),
            url_notify: request.url_notify.clone(),
            is_json_request: request.is_json_request,
            status: OrderStatusType::New,
            created_at: now,
            updated_at: now,
            project_last_requested_at: None,
            project: project.snapshot(),
        })
    }
}

/// Rejects inactive payment methods, and methods whose payment system is missing or inactive.
pub fn validate_payment_method(method: PaymentMethod) -> Result<(PaymentMethod, PaymentSystem), ValidationError> {
    if !method.is_active {
        return Err(ValidationError::PaymentMethodInactive);
    }
    let payment_system = method.payment_system.clone().ok_or(ValidationError::PaymentSystemNotFound)?;
    if !payment_system.is_active {
        return Err(ValidationError::PaymentSystemInactive);
    }
    Ok((method, payment_system))
}

/// Checks the fields whose format is fixed, independently of any project configuration.
pub fn check_field_formats(request: &OrderScalar) -> Result<(), ValidationError> {
    if request.currency.as_deref().is_some_and(|c| !is_currency_code(c)) {
        return Err(ValidationError::MalformedField(FIELD_CURRENCY));
    }
    if request.region.as_deref().is_some_and(|r| !is_region_code(r)) {
        return Err(ValidationError::MalformedField(FIELD_REGION));
    }
    let urls = [
        (FIELD_URL_VERIFY, &request.url_verify),
        (FIELD_URL_NOTIFY, &request.url_notify),
        (FIELD_URL_SUCCESS, &request.url_success),
        (FIELD_URL_FAIL, &request.url_fail),
    ];
    for (field, url) in urls {
        if url.as_deref().is_some_and(|u| !is_url(u)) {
            debug!("📥️ Rejecting malformed {field} '{}'", url.as_deref().unwrap_or_default());
            return Err(ValidationError::MalformedField(field));
        }
    }
    Ok(())
}

/// Picks the project's fixed package for the payer's region that matches the order amount and currency exactly. If
/// several match, the last one wins.
pub fn select_fixed_package(
    project: &Project,
    region: Option<&str>,
    amount: Amount,
    currency: &str,
) -> Result<FixedPackageSnapshot, ValidationError> {
    let region = region.unwrap_or_default();
    let packages = project
        .fixed_packages
        .get(region)
        .filter(|p| !p.is_empty())
        .ok_or(ValidationError::FixedPackageForRegionNotFound)?;
    let package: &FixedPackage = packages
        .iter()
        .rev()
        .find(|p| p.is_active && p.price == amount && p.currency.eq_ignore_ascii_case(currency))
        .ok_or(ValidationError::FixedPackageNotFound)?;
    Ok(FixedPackageSnapshot {
        id: package.id.clone(),
        name: package.name.clone(),
        region: region.to_string(),
        price: package.price,
        currency: package.currency.clone(),
    })
}

/// Collects the non-reserved request fields into the order's passthrough parameters.
pub fn passthrough_params(request: &OrderScalar) -> Result<PrimitiveMap, ValidationError> {
    let mut params = PrimitiveMap::default();
    for (key, value) in request.other.iter().filter(|(k, _)| !is_reserved_field(k)) {
        params.insert_json(key, value)?;
    }
    Ok(params)
}
