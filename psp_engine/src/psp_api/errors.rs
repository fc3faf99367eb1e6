use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType, ParamError},
    traits::{
        BrokerError,
        CatalogError,
        CommissionError,
        ExchangeRateError,
        PaymentHandlerError,
        RepositoryError,
        VatError,
    },
};

/// The message reported to callers for every system-class failure. Internal detail is only ever logged.
pub const OPAQUE_SYSTEM_MESSAGE: &str = "order can't create. try request later";

/// A caller-facing rejection of a request. These are never retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("project with specified identifier not found")]
    ProjectNotFound,
    #[error("project with specified identifier is inactive")]
    ProjectInactive,
    #[error("currency received from request not found")]
    CurrencyNotFound,
    #[error("order request signature is invalid")]
    SignatureInvalid,
    #[error("payment method not specified for project")]
    PaymentMethodNotAllowed,
    #[error("payment method with specified id not found")]
    PaymentMethodNotFound,
    #[error("payment method with specified is inactive")]
    PaymentMethodInactive,
    #[error("payment system for specified payment method not found")]
    PaymentSystemNotFound,
    #[error("payment system for specified payment method is inactive")]
    PaymentSystemInactive,
    #[error("order amount is lower than min allowed payment amount for project")]
    AmountBelowProjectMinimum,
    #[error("order amount is greater than max allowed payment amount for project")]
    AmountAboveProjectMaximum,
    #[error("order amount is lower than min allowed payment amount for payment method")]
    AmountBelowPaymentMethodMinimum,
    #[error("order amount is greater than max allowed payment amount for payment method")]
    AmountAbovePaymentMethodMaximum,
    #[error("request with specified project order identifier processed early")]
    DuplicateProjectOrderId,
    #[error("dynamic verify url or notify url not allowed for project")]
    DynamicNotifyUrlsNotAllowed,
    #[error("dynamic payer redirect urls not allowed for project")]
    DynamicRedirectUrlsNotAllowed,
    #[error("payer region can't be found")]
    PayerRegionUnknown,
    #[error("project not have fixed packages for payer region")]
    FixedPackageForRegionNotFound,
    #[error("project not have fixed package with specified amount or currency")]
    FixedPackageNotFound,
    #[error("invalid passthrough parameter: {0}")]
    InvalidParameter(String),
    #[error("required field \"{0}\" not found")]
    RequiredFieldMissing(&'static str),
    #[error("field \"{0}\" has an invalid format")]
    MalformedField(&'static str),
    #[error("order with specified identifier not found")]
    OrderNotFound,
    #[error("order with specified identifier payed early")]
    OrderAlreadyComplete,
    #[error("payment for order with specified identifier created early")]
    PaymentAlreadyCreated,
    /// A notification arrived for an order whose payment was never created.
    #[error("order can't create. try request later")]
    PaymentNotCreated,
}

impl From<ParamError> for ValidationError {
    fn from(e: ParamError) -> Self {
        ValidationError::InvalidParameter(e.to_string())
    }
}

/// An internal failure. Logged in full, and reported to callers only as [`OPAQUE_SYSTEM_MESSAGE`].
#[derive(Debug, Clone, Error)]
pub enum SystemError {
    #[error("Currency conversion failed. {0}")]
    Conversion(#[from] ExchangeRateError),
    #[error("Commission calculation failed. {0}")]
    Commission(#[from] CommissionError),
    #[error("VAT calculation failed. {0}")]
    Vat(#[from] VatError),
    #[error("Catalog lookup failed. {0}")]
    Catalog(#[from] CatalogError),
    #[error("Storage failure. {0}")]
    Storage(RepositoryError),
    #[error("Order {0} was modified concurrently")]
    ConcurrentModification(OrderId),
    #[error("Could not publish order event. {0}")]
    Publish(#[from] BrokerError),
    #[error("No payment handler is available. {0}")]
    HandlerUnavailable(#[from] PaymentHandlerError),
    #[error("unknown currency received from payment system: {0}")]
    UnknownPaymentSystemCurrency(String),
    #[error("unknown PSP accounting currency")]
    PspAccountingCurrencyMissing,
    #[error("Order {0} has no payment method, so its payment system amounts cannot be derived")]
    MissingPaymentMethod(OrderId),
    #[error("The payment handler reported success without returning the order")]
    HandlerReturnedNoOrder,
    #[error("The payment handler returned order {returned} while processing order {expected}")]
    HandlerChangedOrderId { expected: OrderId, returned: OrderId },
    #[error("The payment handler tried to move order {id} from {from} to {to}")]
    IllegalTransition { id: OrderId, from: OrderStatusType, to: OrderStatusType },
}

impl From<RepositoryError> for SystemError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::VersionConflict { id, .. } => SystemError::ConcurrentModification(id),
            e => SystemError::Storage(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    System(#[from] SystemError),
}

impl OrderFlowError {
    /// The message that may be shown to the caller.
    pub fn public_message(&self) -> String {
        match self {
            OrderFlowError::Validation(e) => e.to_string(),
            OrderFlowError::System(_) => OPAQUE_SYSTEM_MESSAGE.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OrderFlowError::Validation(_))
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            OrderFlowError::Validation(e) => Some(e),
            OrderFlowError::System(_) => None,
        }
    }
}

macro_rules! system_error_into_flow {
    ($($err:ty),+) => {
        $(
            impl From<$err> for OrderFlowError {
                fn from(e: $err) -> Self {
                    OrderFlowError::System(SystemError::from(e))
                }
            }
        )+
    };
}

system_error_into_flow!(
    ExchangeRateError,
    CommissionError,
    VatError,
    CatalogError,
    RepositoryError,
    BrokerError,
    PaymentHandlerError
);

#[derive(Debug, Clone, Error)]
pub enum QueryApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for QueryApiError {
    fn from(e: RepositoryError) -> Self {
        QueryApiError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn system_errors_are_opaque() {
        let err = OrderFlowError::from(ExchangeRateError::RateDoesNotExist("USD/XXX".into()));
        assert_eq!(err.public_message(), OPAQUE_SYSTEM_MESSAGE);
        assert!(err.to_string().contains("USD/XXX"));
        let err = OrderFlowError::from(ValidationError::SignatureInvalid);
        assert_eq!(err.public_message(), "order request signature is invalid");
        assert_eq!(err.validation(), Some(&ValidationError::SignatureInvalid));
    }

    #[test]
    fn version_conflicts_are_reported_as_concurrent_modification() {
        let id = OrderId::from("abc");
        let err = SystemError::from(RepositoryError::VersionConflict { id: id.clone(), expected: 1, found: 2 });
        assert!(matches!(err, SystemError::ConcurrentModification(i) if i == id));
    }
}
