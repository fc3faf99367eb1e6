use std::{fmt::Debug, sync::Arc};

use crate::traits::{
    CommissionCalculator,
    CurrencyLookup,
    ExchangeRates,
    GeoLocator,
    MessageBroker,
    PaymentHandlerFactory,
    PaymentMethodLookup,
    ProjectLookup,
    VatCalculator,
};

/// The external services the order flow depends on.
///
/// Every collaborator is supplied explicitly at construction; there are no global managers.
#[derive(Clone)]
pub struct Collaborators {
    pub projects: Arc<dyn ProjectLookup>,
    pub payment_methods: Arc<dyn PaymentMethodLookup>,
    pub currencies: Arc<dyn CurrencyLookup>,
    pub rates: Arc<dyn ExchangeRates>,
    pub commissions: Arc<dyn CommissionCalculator>,
    pub vat: Arc<dyn VatCalculator>,
    pub geo: Arc<dyn GeoLocator>,
    pub payment_handlers: Arc<dyn PaymentHandlerFactory>,
    pub broker: Arc<dyn MessageBroker>,
}

impl Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Collaborators")
    }
}
