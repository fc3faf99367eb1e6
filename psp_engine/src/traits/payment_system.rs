use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{db_types::Order, psp_api::order_objects::OrderPaymentNotification};

/// Provider-specific settings passed through to payment-system handlers, e.g. API credentials.
pub type ProviderSettings = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// The request succeeded and is final
    Ok,
    /// The request is pending; nothing should change yet
    Temporary,
    /// The payment system rejected the request as invalid
    ErrorValidation,
    /// The payment system failed
    ErrorSystem,
}

/// The outcome of a call into a payment-system handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResponse {
    pub status: PaymentStatus,
    pub message: String,
    /// The order, as updated by the handler. Required for `Ok` results of notification processing.
    pub order: Option<Order>,
    /// Where to send the payer, for handlers that use a hosted payment page
    pub redirect_url: Option<String>,
}

impl PaymentResponse {
    pub fn new(status: PaymentStatus, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), order: None, redirect_url: None }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(PaymentStatus::Ok, message)
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentHandlerError {
    #[error("Order {0} has no payment method")]
    NoPaymentMethod(String),
    #[error("No payment handler is registered under the name '{0}'")]
    HandlerNotFound(String),
    #[error("Payment handler settings are invalid: {0}")]
    InvalidSettings(String),
}

/// A payment system integration. Implementations interpret provider payloads; they never persist anything.
#[async_trait]
pub trait PaymentSystemHandler: Send + Sync {
    /// Ask the payment system to create a payment for `order`, using the payer's payment requisites.
    async fn create_payment(&self, order: &Order, requisites: &BTreeMap<String, String>) -> PaymentResponse;

    /// Interpret a notification from the payment system. An `Ok` result must carry the updated order.
    async fn process_payment(&self, order: &Order, notification: &OrderPaymentNotification) -> PaymentResponse;
}

pub trait PaymentHandlerFactory: Send + Sync {
    /// Selects the handler for the order's payment method.
    fn handler_for(
        &self,
        order: &Order,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn PaymentSystemHandler>, PaymentHandlerError>;
}
